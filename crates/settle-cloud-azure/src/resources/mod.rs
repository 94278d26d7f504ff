//! Azure resource handlers
//!
//! Each handler issues the ARM mutation once and then waits for the resource
//! to settle through a convergence session built from the operation context.

pub mod app_configuration;
pub mod cosmosdb;
pub mod log_analytics;
pub mod redis;

pub use app_configuration::{AppConfigurationStore, NameAvailabilityPoller};
pub use cosmosdb::{CosmosDbAccount, CosmosLocationPoller};
pub use log_analytics::LogAnalyticsCluster;
pub use redis::RedisCache;

use crate::client::ManagementApi;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use settle_cloud::convergence::ConvergenceSpecBuilder;
use settle_cloud::{
    CloudError, Observation, OperationContext, PollResult, Poller, ResourceConfig, ResourceState,
    ResourceStatus, await_convergence,
};

/// Target label of delete sessions; a 404 is observed as absence
pub const NOT_FOUND: &str = "NotFound";

/// Label reported by `DeletionPoller` for an object that is still readable
pub const DELETING: &str = "Deleting";

/// Polls `properties.provisioningState` of one resource
///
/// A 404 is reported as absence and a body without the field as an
/// unlabelled object; the session's policies decide what either means.
pub struct ProvisioningStatePoller<'a> {
    api: &'a dyn ManagementApi,
    path: String,
    api_version: &'a str,
}

impl<'a> ProvisioningStatePoller<'a> {
    pub fn new(api: &'a dyn ManagementApi, id: &ResourceId, api_version: &'a str) -> Self {
        Self {
            api,
            path: id.path(),
            api_version,
        }
    }
}

#[async_trait]
impl Poller for ProvisioningStatePoller<'_> {
    type Object = Value;

    async fn poll(&self) -> PollResult<Value> {
        match self.api.get(&self.path, self.api_version).await {
            Ok(body) => {
                let state = provisioning_state(&body).map(str::to_string);
                Ok(Observation::from_state(body, state))
            }
            Err(e) if e.is_not_found() => Ok(Observation::absent()),
            Err(e) => Err(e.into_poll_error()),
        }
    }
}

/// Polls a resource that has been deleted until reads return 404
///
/// A deleted resource can keep answering reads with its last provisioning
/// state (often `Succeeded`) while it drains, so any readable body is
/// reported as `DELETING` regardless of what it says.
pub struct DeletionPoller<'a> {
    api: &'a dyn ManagementApi,
    path: String,
    api_version: &'a str,
    label: &'static str,
}

impl<'a> DeletionPoller<'a> {
    pub fn new(api: &'a dyn ManagementApi, path: impl Into<String>, api_version: &'a str) -> Self {
        Self {
            api,
            path: path.into(),
            api_version,
            label: DELETING,
        }
    }

    /// Report readable bodies as `label` instead of `DELETING`
    pub fn labelled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

#[async_trait]
impl Poller for DeletionPoller<'_> {
    type Object = Value;

    async fn poll(&self) -> PollResult<Value> {
        match self.api.get(&self.path, self.api_version).await {
            Ok(body) => Ok(Observation::present(body, self.label)),
            Err(e) if e.is_not_found() => Ok(Observation::absent()),
            Err(e) => Err(e.into_poll_error()),
        }
    }
}

/// `properties.provisioningState` of an ARM resource body
pub fn provisioning_state(body: &Value) -> Option<&str> {
    body.pointer("/properties/provisioningState")
        .and_then(Value::as_str)
}

pub(crate) fn parse_config<T: DeserializeOwned>(config: &ResourceConfig) -> Result<T, CloudError> {
    serde_json::from_value(config.config.clone()).map_err(|e| {
        CloudError::InvalidConfig(format!("{}: {}", config.key(), e))
    })
}

/// Local snapshot of an ARM resource body
pub(crate) fn to_resource_state(id: &ResourceId, resource_type: &str, body: &Value) -> ResourceState {
    let status = provisioning_state(body)
        .map(ResourceStatus::from_provisioning_state)
        .unwrap_or(ResourceStatus::Unknown);

    let mut state = ResourceState::new(id.path(), resource_type).with_status(status);
    for key in ["name", "location", "tags", "properties"] {
        if let Some(value) = body.get(key) {
            state.set_attribute(key, value.clone());
        }
    }
    state
}

/// Fail when the resource already exists; it must be imported instead
pub(crate) async fn ensure_absent(
    api: &dyn ManagementApi,
    id: &ResourceId,
    api_version: &str,
) -> Result<(), CloudError> {
    match api.get(&id.path(), api_version).await {
        Ok(_) => Err(CloudError::ResourceAlreadyExists(format!(
            "{} already exists and needs to be imported",
            id
        ))),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Issue the DELETE and wait until reads return 404
///
/// `session` names the resource and sets its poll spacing; the labels are
/// filled in here.
pub(crate) async fn delete_and_wait(
    api: &dyn ManagementApi,
    id: &ResourceId,
    api_version: &str,
    ctx: &OperationContext,
    session: ConvergenceSpecBuilder,
) -> Result<(), CloudError> {
    match api.delete(&id.path(), api_version).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::info!(%id, "Already deleted");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(%id, remaining = ?ctx.remaining(), "Delete accepted, waiting for removal");

    let spec = session
        .pending([DELETING])
        .target([NOT_FOUND])
        .treat_absence_as_target()
        .build()?;
    let poller = DeletionPoller::new(api, id.path(), api_version);
    await_convergence(&spec, &poller, ctx.cancel()).await?;
    Ok(())
}

/// Read a resource back; `None` when it no longer exists
pub(crate) async fn read_state(
    api: &dyn ManagementApi,
    id: &ResourceId,
    api_version: &str,
    resource_type: &str,
) -> Result<Option<ResourceState>, CloudError> {
    match api.get(&id.path(), api_version).await {
        Ok(body) => Ok(Some(to_resource_state(id, resource_type, &body))),
        Err(e) if e.is_not_found() => {
            tracing::debug!(%id, "Resource is gone");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Insert `value` under `key` only when it is present
pub(crate) fn insert_opt<T: serde::Serialize>(object: &mut Value, key: &str, value: Option<T>) {
    if let (Some(value), Some(map)) = (value, object.as_object_mut()) {
        if let Ok(value) = serde_json::to_value(value) {
            map.insert(key.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provisioning_state() {
        let body = json!({ "properties": { "provisioningState": "Updating" } });
        assert_eq!(provisioning_state(&body), Some("Updating"));
        assert_eq!(provisioning_state(&json!({ "properties": {} })), None);
        assert_eq!(
            provisioning_state(&json!({ "properties": { "provisioningState": null } })),
            None
        );
    }

    #[test]
    fn test_to_resource_state() {
        let id = ResourceId::new("0000", "rg1", "Microsoft.Cache", "redis", "cache1");
        let body = json!({
            "name": "cache1",
            "location": "westeurope",
            "properties": { "provisioningState": "Succeeded", "port": 6379 }
        });
        let state = to_resource_state(&id, "azure-redis-cache", &body);
        assert_eq!(state.id, id.path());
        assert_eq!(state.status, ResourceStatus::Ready);
        assert_eq!(state.get_attribute::<String>("location"), Some("westeurope".into()));
        assert!(state.get_attribute::<Value>("tags").is_none());
    }

    #[test]
    fn test_insert_opt() {
        let mut object = json!({});
        insert_opt(&mut object, "shardCount", Some(2));
        insert_opt::<u32>(&mut object, "replicas", None);
        assert_eq!(object, json!({ "shardCount": 2 }));
    }
}
