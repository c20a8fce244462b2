//! KubeSphere API payloads
//!
//! Only the fields the synchronizer reads are modelled. Every optional part of
//! an object is an `Option` so that both a missing key and an explicit `null`
//! decode to "not set".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Kubernetes resource quantity in its textual form (`"500m"`, `"2Gi"`)
///
/// String values are carried through untouched; nothing in this crate does
/// arithmetic on quantities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(String);

impl Quantity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Quantity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// The API server emits quantities as strings, but hand-written objects
// sometimes carry bare numbers or nulls. Numbers are rendered in canonical
// form (`0.5` is `500m`, `1000` is `1k`) and null is a zero quantity.
impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
            Null,
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Quantity(s),
            Raw::Int(n) => Quantity(canonical_integer(n)),
            Raw::Float(n) => Quantity(canonical_decimal(n)),
            Raw::Null => Quantity("0".to_string()),
        })
    }
}

const DECIMAL_SUFFIXES: [&str; 6] = ["k", "M", "G", "T", "P", "E"];

fn canonical_integer(value: i64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut mantissa = value;
    let mut exponent = 0;
    while exponent < DECIMAL_SUFFIXES.len() && mantissa % 1000 == 0 {
        mantissa /= 1000;
        exponent += 1;
    }

    match exponent {
        0 => mantissa.to_string(),
        _ => format!("{}{}", mantissa, DECIMAL_SUFFIXES[exponent - 1]),
    }
}

fn canonical_decimal(value: f64) -> String {
    const SCALES: [(f64, &str); 3] = [(1e3, "m"), (1e6, "u"), (1e9, "n")];

    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return canonical_integer(value as i64);
    }
    for (factor, suffix) in SCALES {
        let scaled = value * factor;
        if (scaled - scaled.round()).abs() < 1e-6 {
            return format!("{}{}", scaled.round() as i64, suffix);
        }
    }
    // Precision below nano units is rounded up
    format!("{}n", (value * 1e9).ceil() as i64)
}

/// Resource name to quantity
pub type ResourceList = BTreeMap<String, Quantity>;

/// `POST /oauth/token` response
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
}

/// `tenant.kubesphere.io/v1alpha2` WorkspaceTemplateList
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceTemplateList {
    #[serde(default)]
    pub items: Option<Vec<WorkspaceTemplate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<WorkspaceTemplateSpec>,
}

impl WorkspaceTemplate {
    /// Cluster names from the placement, in the order the API returned them
    pub fn placement_clusters(&self) -> impl Iterator<Item = &str> {
        self.spec
            .iter()
            .flat_map(|spec| spec.placement.iter())
            .flat_map(|placement| placement.clusters.iter().flatten())
            .map(|cluster| cluster.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceTemplateSpec {
    #[serde(default)]
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub clusters: Option<Vec<ClusterReference>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterReference {
    #[serde(default)]
    pub name: String,
}

/// `quota.kubesphere.io/v1alpha2` ResourceQuota
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceQuota {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<ResourceQuotaSpec>,
    #[serde(default)]
    pub status: Option<ResourceQuotaStatus>,
}

impl ResourceQuota {
    /// Declared limits from `spec.quota.hard`
    pub fn declared_hard(&self) -> Option<&ResourceList> {
        self.spec
            .as_ref()
            .and_then(|spec| spec.quota.as_ref())
            .and_then(|quota| quota.hard.as_ref())
    }

    /// Aggregated totals from `status.total`
    pub fn total(&self) -> Option<&QuotaTotals> {
        self.status.as_ref().and_then(|status| status.total.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceQuotaSpec {
    #[serde(default)]
    pub quota: Option<QuotaTotals>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceQuotaStatus {
    #[serde(default)]
    pub total: Option<QuotaTotals>,
}

/// `hard`/`used` pair shared by the spec and the aggregated status
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuotaTotals {
    #[serde(default)]
    pub hard: Option<ResourceList>,
    #[serde(default)]
    pub used: Option<ResourceList>,
}

impl QuotaTotals {
    /// True when neither side has been set, i.e. usage was never aggregated
    pub fn is_zero(&self) -> bool {
        self.hard.is_none() && self.used.is_none()
    }
}
