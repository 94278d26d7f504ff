//! Resource handler trait definition

use crate::error::Result;
use crate::operation::OperationContext;
use crate::state::ResourceState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// CRUD for one resource type
///
/// Every mutating method returns only after the remote object has converged
/// (or the wait failed), so callers can read the result back immediately.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Resource type handled (e.g. "redis-cache", "cosmosdb-account")
    fn resource_type(&self) -> &str;

    /// Create the resource and wait until it is usable
    async fn create(&self, config: &ResourceConfig, ctx: &OperationContext)
    -> Result<ResourceState>;

    /// Read the current remote state; `None` when the resource is gone
    async fn read(&self, id: &str, ctx: &OperationContext) -> Result<Option<ResourceState>>;

    /// Apply changes and wait until they have settled
    async fn update(&self, config: &ResourceConfig, ctx: &OperationContext)
    -> Result<ResourceState>;

    /// Delete the resource and wait until it is gone
    async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()>;
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "redis-cache")
    pub resource_type: String,

    /// Resource identifier
    pub id: String,

    /// Provider name
    pub provider: String,

    /// Resource-specific configuration
    pub config: serde_json::Value,
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        provider: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            provider: provider.into(),
            config,
        }
    }

    /// Get the full resource key (type:id)
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
