//! Quota Normalizer
//!
//! Turns a decoded [`ResourceQuota`] into the string maps carried by events.
//!
//! When the control plane has not aggregated usage yet (`status.total` unset)
//! the declared `spec.quota.hard` limits are published together with a fixed
//! set of zero usage keys, so consumers always see both `hard` and `used`.

use std::collections::BTreeMap;

use crate::event::QuotaUsage;
use crate::kubesphere::types::{ResourceList, ResourceQuota};

/// Storage class whose request key is part of the zero-usage set by default
pub const DEFAULT_STORAGE_CLASS: &str = "huawei-fusionstorage";

const FALLBACK_COMPUTE_KEYS: [&str; 4] = [
    "requests.cpu",
    "limits.cpu",
    "requests.memory",
    "limits.memory",
];

/// Zero usage reported before the control plane aggregates real usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackUsage {
    keys: Vec<String>,
}

impl FallbackUsage {
    /// Compute keys plus the storage request key of `storage_class`
    pub fn new(storage_class: &str) -> Self {
        let mut keys: Vec<String> = FALLBACK_COMPUTE_KEYS.iter().map(|k| k.to_string()).collect();
        keys.push(storage_request_key(storage_class));
        Self { keys }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Every fallback key mapped to `"0"`
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.keys.iter().map(|k| (k.clone(), "0".to_string())).collect()
    }
}

impl Default for FallbackUsage {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_CLASS)
    }
}

/// Quota key limiting storage requested through a storage class
pub fn storage_request_key(storage_class: &str) -> String {
    format!("{}.storageclass.storage.k8s.io/requests.storage", storage_class)
}

/// Convert a resource list to resource name → quantity string
pub fn to_string_map(list: &ResourceList) -> BTreeMap<String, String> {
    list.iter()
        .map(|(name, quantity)| (name.clone(), quantity.to_string()))
        .collect()
}

fn to_string_map_or_empty(list: Option<&ResourceList>) -> BTreeMap<String, String> {
    list.map(to_string_map).unwrap_or_default()
}

/// Select the representation for a quota
///
/// Returns the aggregated `status.total` maps when present, otherwise the
/// declared limits and the zero-usage fallback.
pub fn normalize(quota: &ResourceQuota, fallback: &FallbackUsage) -> QuotaUsage {
    match quota.total() {
        Some(total) if !total.is_zero() => QuotaUsage {
            hard: to_string_map_or_empty(total.hard.as_ref()),
            used: to_string_map_or_empty(total.used.as_ref()),
        },
        _ => QuotaUsage {
            hard: to_string_map_or_empty(quota.declared_hard()),
            used: fallback.to_map(),
        },
    }
}

/// True when `normalize` would take the fallback branch
pub fn uses_fallback(quota: &ResourceQuota) -> bool {
    quota.total().map_or(true, |total| total.is_zero())
}
