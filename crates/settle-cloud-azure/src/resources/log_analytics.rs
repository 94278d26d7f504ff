//! Log Analytics clusters
//!
//! Reads of a freshly created cluster can come back without a provisioning
//! state for a while. The create session keeps polling through that; every
//! other session fails on it.

use super::{
    ProvisioningStatePoller, delete_and_wait, ensure_absent, parse_config, read_state,
    to_resource_state,
};
use crate::client::ManagementApi;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use settle_cloud::convergence::MissingLabelPolicy;
use settle_cloud::{
    CloudError, OperationContext, ResourceConfig, ResourceHandler, ResourceState, Result,
    await_convergence,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "azure-log-analytics-cluster";

const NAMESPACE: &str = "Microsoft.OperationalInsights";
const TYPE: &str = "clusters";
const API_VERSION: &str = "2022-10-01";
const PENDING: [&str; 3] = ["Updating", "Creating", "ProvisioningAccount"];
const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Desired state of a Log Analytics cluster
#[derive(Debug, Clone, Deserialize)]
pub struct LogAnalyticsClusterConfig {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    /// Capacity reservation in GB per day
    #[serde(default = "default_size_gb")]
    pub size_gb: u32,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_size_gb() -> u32 {
    1000
}

impl LogAnalyticsClusterConfig {
    fn sku(&self) -> Value {
        json!({ "name": "CapacityReservation", "capacity": self.size_gb })
    }

    fn create_body(&self) -> Value {
        json!({
            "location": self.location,
            "identity": { "type": "SystemAssigned" },
            "sku": self.sku(),
            "tags": self.tags,
        })
    }

    fn update_body(&self) -> Value {
        json!({ "sku": self.sku(), "tags": self.tags })
    }
}

/// Handler for `azure-log-analytics-cluster` resources
pub struct LogAnalyticsCluster {
    api: Arc<dyn ManagementApi>,
}

impl LogAnalyticsCluster {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self { api }
    }

    fn id(&self, config: &LogAnalyticsClusterConfig) -> ResourceId {
        ResourceId::new(
            self.api.subscription_id(),
            &config.resource_group,
            NAMESPACE,
            TYPE,
            &config.name,
        )
    }

    async fn wait_until_succeeded(
        &self,
        id: &ResourceId,
        ctx: &OperationContext,
        missing_label: MissingLabelPolicy,
    ) -> Result<ResourceState> {
        let spec = ctx
            .convergence(format!("log analytics cluster {}", id.name))
            .pending(PENDING)
            .target(["Succeeded"])
            .missing_label(missing_label)
            .min_poll_interval(POLL_INTERVAL)
            .build()?;
        let poller = ProvisioningStatePoller::new(self.api.as_ref(), id, API_VERSION);

        let converged = await_convergence(&spec, &poller, ctx.cancel()).await?;
        let body = converged
            .object
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        Ok(to_resource_state(id, RESOURCE_TYPE, &body))
    }
}

#[async_trait]
impl ResourceHandler for LogAnalyticsCluster {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: LogAnalyticsClusterConfig = parse_config(config)?;
        let id = self.id(&desired);

        ensure_absent(self.api.as_ref(), &id, API_VERSION).await?;

        tracing::info!(%id, size_gb = desired.size_gb, "Creating Log Analytics cluster");
        self.api
            .put(&id.path(), API_VERSION, &desired.create_body())
            .await?;

        self.wait_until_succeeded(&id, ctx, MissingLabelPolicy::Pending)
            .await
    }

    async fn read(&self, id: &str, _ctx: &OperationContext) -> Result<Option<ResourceState>> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        read_state(self.api.as_ref(), &id, API_VERSION, RESOURCE_TYPE).await
    }

    async fn update(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: LogAnalyticsClusterConfig = parse_config(config)?;
        let id = self.id(&desired);

        tracing::info!(%id, size_gb = desired.size_gb, "Updating Log Analytics cluster");
        self.api
            .patch(&id.path(), API_VERSION, &desired.update_body())
            .await?;

        self.wait_until_succeeded(&id, ctx, MissingLabelPolicy::Fail)
            .await
    }

    async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        tracing::info!(%id, "Deleting Log Analytics cluster");
        let session = ctx
            .convergence(format!("log analytics cluster {}", id.name))
            .min_poll_interval(POLL_INTERVAL);
        delete_and_wait(self.api.as_ref(), &id, API_VERSION, ctx, session).await
    }
}
