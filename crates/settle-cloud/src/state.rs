//! Local view of a remote resource
//!
//! The remote system is the only source of truth; a `ResourceState` is what
//! the last read reconciled back into local state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Provider-specific resource ID
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// Current status
    pub status: ResourceStatus,

    /// Resource attributes (host name, SKU, etc.)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When this snapshot was taken
    pub observed_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            attributes: HashMap::new(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Status of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Resource is being created
    Creating,
    /// Resource is being changed
    Updating,
    /// Resource is provisioned and usable
    Ready,
    /// Resource is being deleted
    Deleting,
    /// Resource provisioning failed
    Failed,
    /// Status is unknown
    Unknown,
}

impl ResourceStatus {
    /// Map a provisioning state label onto a local status
    pub fn from_provisioning_state(label: &str) -> Self {
        match label {
            "Succeeded" | "Running" | "Available" => ResourceStatus::Ready,
            "Creating" | "Provisioning" | "ProvisioningAccount" | "Initializing" | "Enqueued"
            | "Dequeued" => ResourceStatus::Creating,
            "Updating" | "Scaling" | "Upgrading" | "UpgradingRedisServerVersion" => {
                ResourceStatus::Updating
            }
            "Deleting" => ResourceStatus::Deleting,
            "Failed" | "Canceled" => ResourceStatus::Failed,
            _ => ResourceStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Creating => write!(f, "creating"),
            ResourceStatus::Updating => write!(f, "updating"),
            ResourceStatus::Ready => write!(f, "ready"),
            ResourceStatus::Deleting => write!(f, "deleting"),
            ResourceStatus::Failed => write!(f, "failed"),
            ResourceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ResourceStatus::from_provisioning_state("Succeeded"),
            ResourceStatus::Ready
        );
        assert_eq!(
            ResourceStatus::from_provisioning_state("Scaling"),
            ResourceStatus::Updating
        );
        assert_eq!(
            ResourceStatus::from_provisioning_state("Deleting"),
            ResourceStatus::Deleting
        );
        assert_eq!(
            ResourceStatus::from_provisioning_state("SomethingNew"),
            ResourceStatus::Unknown
        );
    }

    #[test]
    fn test_attributes() {
        let state = ResourceState::new("/subscriptions/s/x", "redis-cache")
            .with_status(ResourceStatus::Ready)
            .with_attribute("hostname", serde_json::json!("cache1.redis.cache.windows.net"));

        assert_eq!(state.status.to_string(), "ready");
        assert_eq!(
            state.get_attribute::<String>("hostname").as_deref(),
            Some("cache1.redis.cache.windows.net")
        );
        assert_eq!(state.get_attribute::<u32>("hostname"), None);
    }
}
