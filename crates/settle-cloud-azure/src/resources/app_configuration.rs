//! App Configuration stores
//!
//! Deleting a store with soft delete leaves its name reserved. When purging
//! is enabled the handler purges the deleted store and then waits until the
//! name can be claimed again, so an immediate re-create does not collide.

use super::{
    DeletionPoller, NOT_FOUND, ProvisioningStatePoller, delete_and_wait, ensure_absent,
    parse_config, read_state, to_resource_state,
};
use crate::client::ManagementApi;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use settle_cloud::{
    CloudError, ConvergenceSpec, Observation, OperationContext, PollError, PollResult, Poller,
    ResourceConfig, ResourceHandler, ResourceState, Result, await_convergence,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const RESOURCE_TYPE: &str = "azure-app-configuration";

const NAMESPACE: &str = "Microsoft.AppConfiguration";
const TYPE: &str = "configurationStores";
const API_VERSION: &str = "2024-05-01";
const NAME_BACKOFF_MULTIPLIER: f64 = 2.0;

pub const AVAILABLE: &str = "Available";
pub const UNAVAILABLE: &str = "Unavailable";
const PURGING: &str = "Purging";

/// Desired state of an App Configuration store
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfigurationConfig {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    #[serde(default = "default_sku")]
    pub sku: String,
    #[serde(default)]
    pub soft_delete_retention_days: Option<u32>,
    #[serde(default)]
    pub purge_protection_enabled: bool,
    #[serde(default = "default_true")]
    pub local_auth_enabled: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_sku() -> String {
    "standard".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfigurationConfig {
    fn properties(&self) -> Value {
        let mut properties = json!({
            "disableLocalAuth": !self.local_auth_enabled,
            "enablePurgeProtection": self.purge_protection_enabled,
        });
        super::insert_opt(
            &mut properties,
            "softDeleteRetentionInDays",
            self.soft_delete_retention_days,
        );
        properties
    }

    fn create_body(&self) -> Value {
        json!({
            "location": self.location,
            "sku": { "name": self.sku },
            "tags": self.tags,
            "properties": self.properties(),
        })
    }

    fn update_body(&self) -> Value {
        json!({
            "sku": { "name": self.sku },
            "tags": self.tags,
            "properties": self.properties(),
        })
    }
}

/// Polls `checkNameAvailability` for a store name
pub struct NameAvailabilityPoller<'a> {
    api: &'a dyn ManagementApi,
    path: String,
    name: String,
}

impl<'a> NameAvailabilityPoller<'a> {
    pub fn new(api: &'a dyn ManagementApi, name: impl Into<String>) -> Self {
        Self {
            path: format!(
                "/subscriptions/{}/providers/{}/checkNameAvailability",
                api.subscription_id(),
                NAMESPACE
            ),
            api,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Poller for NameAvailabilityPoller<'_> {
    type Object = Value;

    async fn poll(&self) -> PollResult<Value> {
        let body = json!({
            "name": self.name,
            "type": format!("{}/{}", NAMESPACE, TYPE),
        });
        let response = self
            .api
            .post(&self.path, API_VERSION, &body)
            .await
            .map_err(|e| e.into_poll_error())?;

        match response.get("nameAvailable").and_then(Value::as_bool) {
            Some(true) => Ok(Observation::present(response, AVAILABLE)),
            Some(false) => Ok(Observation::present(response, UNAVAILABLE)),
            None => Err(PollError::decode(format!(
                "checkNameAvailability for {} returned no nameAvailable",
                self.name
            ))),
        }
    }
}

/// Handler for `azure-app-configuration` resources
pub struct AppConfigurationStore {
    api: Arc<dyn ManagementApi>,
    purge_soft_delete_on_destroy: bool,
}

impl AppConfigurationStore {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self {
            api,
            purge_soft_delete_on_destroy: true,
        }
    }

    pub fn with_purge_soft_delete_on_destroy(mut self, purge: bool) -> Self {
        self.purge_soft_delete_on_destroy = purge;
        self
    }

    fn id(&self, config: &AppConfigurationConfig) -> ResourceId {
        ResourceId::new(
            self.api.subscription_id(),
            &config.resource_group,
            NAMESPACE,
            TYPE,
            &config.name,
        )
    }

    fn deleted_store_path(&self, location: &str, name: &str) -> String {
        format!(
            "/subscriptions/{}/providers/{}/locations/{}/deletedConfigurationStores/{}",
            self.api.subscription_id(),
            NAMESPACE,
            location.replace(' ', "").to_lowercase(),
            name
        )
    }

    async fn wait_until_succeeded(&self, id: &ResourceId, ctx: &OperationContext) -> Result<ResourceState> {
        let spec = ctx
            .convergence(format!("app configuration {}", id.name))
            .pending(["Creating", "Updating"])
            .target(["Succeeded"])
            .build()?;
        let poller = ProvisioningStatePoller::new(self.api.as_ref(), id, API_VERSION);

        let converged = await_convergence(&spec, &poller, ctx.cancel()).await?;
        let body = converged
            .object
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        Ok(to_resource_state(id, RESOURCE_TYPE, &body))
    }

    /// Wait until `name` is reported available twice in a row
    ///
    /// Name release has no fixed duration, so checks back off up to the
    /// context's maximum poll interval.
    pub async fn wait_for_name_available(&self, name: &str, ctx: &OperationContext) -> Result<()> {
        let spec = ConvergenceSpec::builder(format!("app configuration name {}", name))
            .pending([UNAVAILABLE])
            .target([AVAILABLE])
            .continuous_target_occurrences(2)
            .min_poll_interval(ctx.min_poll_interval())
            .backoff(ctx.growing_backoff(NAME_BACKOFF_MULTIPLIER))
            .deadline_at(ctx.deadline())
            .build()?;
        let poller = NameAvailabilityPoller::new(self.api.as_ref(), name);

        await_convergence(&spec, &poller, ctx.cancel()).await?;
        tracing::debug!(name, "Name is available again");
        Ok(())
    }

    async fn purge(&self, id: &ResourceId, location: &str, ctx: &OperationContext) -> Result<()> {
        let path = self.deleted_store_path(location, &id.name);

        tracing::info!(%id, "Purging soft-deleted App Configuration store");
        self.api
            .post(&format!("{}/purge", path), API_VERSION, &Value::Null)
            .await?;

        // The purge call returns no operation to follow; wait for the
        // deleted store to read as 404.
        let spec = ctx
            .convergence(format!("deleted app configuration {}", id.name))
            .pending([PURGING])
            .target([NOT_FOUND])
            .treat_absence_as_target()
            .build()?;
        let poller = DeletionPoller::new(self.api.as_ref(), path, API_VERSION).labelled(PURGING);
        await_convergence(&spec, &poller, ctx.cancel()).await?;

        self.wait_for_name_available(&id.name, ctx).await
    }
}

#[async_trait]
impl ResourceHandler for AppConfigurationStore {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: AppConfigurationConfig = parse_config(config)?;
        let id = self.id(&desired);

        ensure_absent(self.api.as_ref(), &id, API_VERSION).await?;

        tracing::info!(%id, sku = %desired.sku, "Creating App Configuration store");
        self.api
            .put(&id.path(), API_VERSION, &desired.create_body())
            .await?;

        self.wait_until_succeeded(&id, ctx).await
    }

    async fn read(&self, id: &str, _ctx: &OperationContext) -> Result<Option<ResourceState>> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        read_state(self.api.as_ref(), &id, API_VERSION, RESOURCE_TYPE).await
    }

    async fn update(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        let desired: AppConfigurationConfig = parse_config(config)?;
        let id = self.id(&desired);

        tracing::info!(%id, "Updating App Configuration store");
        self.api
            .patch(&id.path(), API_VERSION, &desired.update_body())
            .await?;

        self.wait_until_succeeded(&id, ctx).await
    }

    async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;

        let existing = match self.api.get(&id.path(), API_VERSION).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                tracing::info!(%id, "Already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let location = existing
            .get("location")
            .and_then(Value::as_str)
            .filter(|location| !location.is_empty())
            .ok_or_else(|| {
                CloudError::ApiError(format!("{} was read back without a location", id))
            })?
            .to_string();
        let soft_delete = existing
            .pointer("/properties/softDeleteRetentionInDays")
            .and_then(Value::as_u64)
            .is_some_and(|days| days > 0);
        let purge_protection = existing
            .pointer("/properties/enablePurgeProtection")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        tracing::info!(%id, "Deleting App Configuration store");
        let session = ctx.convergence(format!("app configuration {}", id.name));
        delete_and_wait(self.api.as_ref(), &id, API_VERSION, ctx, session).await?;

        if !(self.purge_soft_delete_on_destroy && soft_delete) {
            return Ok(());
        }
        if purge_protection {
            tracing::info!(%id, "Purge protection is enabled; Azure purges the store on schedule");
            return Ok(());
        }
        self.purge(&id, &location, ctx).await
    }
}
