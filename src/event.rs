//! Bus Event Schema
//!
//! Typed form of the message written to the bus:
//!
//! ```json
//! {"btype":"k8s_quota","action":"update",
//!  "data":{"workspace":"ws","cluster":"c1","quota":{"hard":{..},"used":{..}}}}
//! ```
//!
//! Events are built once and serialized only at the publisher boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Message key used for every quota event
pub const EVENT_KEY: &str = "k8s_quota";

/// Business type tag of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusinessType {
    #[serde(rename = "k8s_quota")]
    K8sQuota,
}

/// Action tag of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Update,
}

/// Declared and observed quantities, resource name to quantity string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub hard: BTreeMap<String, String>,
    pub used: BTreeMap<String, String>,
}

/// Quota state of one workspace on one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub workspace: String,
    pub cluster: String,
    pub quota: QuotaUsage,
}

impl QuotaSnapshot {
    pub fn new(workspace: impl Into<String>, cluster: impl Into<String>, quota: QuotaUsage) -> Self {
        Self {
            workspace: workspace.into(),
            cluster: cluster.into(),
            quota,
        }
    }
}

/// Envelope published to the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub btype: BusinessType,
    pub action: Action,
    pub data: QuotaSnapshot,
}

impl Event {
    /// Quota update event for a snapshot
    pub fn quota_update(snapshot: QuotaSnapshot) -> Self {
        Self {
            btype: BusinessType::K8sQuota,
            action: Action::Update,
            data: snapshot,
        }
    }

    pub fn key(&self) -> &'static str {
        match self.btype {
            BusinessType::K8sQuota => EVENT_KEY,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
