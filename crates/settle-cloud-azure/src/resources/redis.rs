//! Azure Cache for Redis

use super::{
    ProvisioningStatePoller, delete_and_wait, ensure_absent, insert_opt, parse_config, read_state,
    to_resource_state,
};
use crate::client::ManagementApi;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use settle_cloud::{
    CloudError, OperationContext, ResourceConfig, ResourceHandler, ResourceState, Result,
    await_convergence,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "azure-redis-cache";

const NAMESPACE: &str = "Microsoft.Cache";
const TYPE: &str = "redis";
const API_VERSION: &str = "2024-03-01";
const POLL_INTERVAL: Duration = Duration::from_secs(15);

const CREATE_PENDING: [&str; 3] = ["Scaling", "Updating", "Creating"];
const UPDATE_PENDING: [&str; 4] = [
    "Scaling",
    "Updating",
    "Creating",
    "UpgradingRedisServerVersion",
];

/// Desired state of a Redis cache
#[derive(Debug, Clone, Deserialize)]
pub struct RedisCacheConfig {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    /// Basic, Standard or Premium
    pub sku_name: String,
    /// C or P
    pub family: String,
    pub capacity: u32,
    #[serde(default)]
    pub enable_non_ssl_port: bool,
    #[serde(default = "default_tls_version")]
    pub minimum_tls_version: String,
    #[serde(default)]
    pub redis_version: Option<String>,
    #[serde(default)]
    pub shard_count: Option<u32>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_tls_version() -> String {
    "1.2".to_string()
}

impl RedisCacheConfig {
    fn properties(&self) -> Value {
        let mut properties = json!({
            "sku": {
                "name": self.sku_name,
                "family": self.family,
                "capacity": self.capacity,
            },
            "enableNonSslPort": self.enable_non_ssl_port,
            "minimumTlsVersion": self.minimum_tls_version,
        });
        insert_opt(&mut properties, "redisVersion", self.redis_version.as_ref());
        insert_opt(&mut properties, "shardCount", self.shard_count);
        properties
    }

    fn create_body(&self) -> Value {
        json!({
            "location": self.location,
            "tags": self.tags,
            "properties": self.properties(),
        })
    }

    fn update_body(&self) -> Value {
        json!({
            "tags": self.tags,
            "properties": self.properties(),
        })
    }
}

/// Handler for `azure-redis-cache` resources
pub struct RedisCache {
    api: Arc<dyn ManagementApi>,
}

impl RedisCache {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self { api }
    }

    fn id(&self, config: &RedisCacheConfig) -> ResourceId {
        ResourceId::new(
            self.api.subscription_id(),
            &config.resource_group,
            NAMESPACE,
            TYPE,
            &config.name,
        )
    }

    /// Wait until the cache reports `Succeeded` and return its last body
    async fn wait_until_available(
        &self,
        id: &ResourceId,
        ctx: &OperationContext,
        pending: &[&str],
    ) -> Result<Value> {
        let spec = ctx
            .convergence(format!("redis cache {}", id.name))
            .pending(pending.iter().copied())
            .target(["Succeeded"])
            .min_poll_interval(POLL_INTERVAL)
            .build()?;
        let poller = ProvisioningStatePoller::new(self.api.as_ref(), id, API_VERSION);

        let converged = await_convergence(&spec, &poller, ctx.cancel()).await?;
        converged
            .object
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))
    }
}

#[async_trait]
impl ResourceHandler for RedisCache {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: RedisCacheConfig = parse_config(config)?;
        let id = self.id(&desired);

        ensure_absent(self.api.as_ref(), &id, API_VERSION).await?;

        tracing::info!(%id, sku = %desired.sku_name, "Creating Redis cache");
        self.api
            .put(&id.path(), API_VERSION, &desired.create_body())
            .await?;

        let body = self.wait_until_available(&id, ctx, &CREATE_PENDING).await?;
        Ok(to_resource_state(&id, RESOURCE_TYPE, &body))
    }

    async fn read(&self, id: &str, _ctx: &OperationContext) -> Result<Option<ResourceState>> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        read_state(self.api.as_ref(), &id, API_VERSION, RESOURCE_TYPE).await
    }

    async fn update(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: RedisCacheConfig = parse_config(config)?;
        let id = self.id(&desired);

        tracing::info!(%id, "Updating Redis cache");
        self.api
            .patch(&id.path(), API_VERSION, &desired.update_body())
            .await?;

        let body = self.wait_until_available(&id, ctx, &UPDATE_PENDING).await?;
        Ok(to_resource_state(&id, RESOURCE_TYPE, &body))
    }

    async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        tracing::info!(%id, "Deleting Redis cache");
        let session = ctx
            .convergence(format!("redis cache {}", id.name))
            .min_poll_interval(POLL_INTERVAL);
        delete_and_wait(self.api.as_ref(), &id, API_VERSION, ctx, session).await
    }
}
