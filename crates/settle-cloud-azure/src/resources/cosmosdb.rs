//! Azure Cosmos DB accounts
//!
//! An account reports `Succeeded` at the top level while individual
//! replication locations are still being provisioned, so create and update
//! sessions derive their label from the per-location states instead.

use super::{delete_and_wait, ensure_absent, parse_config, read_state, to_resource_state};
use crate::client::ManagementApi;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use settle_cloud::{
    CloudError, Observation, OperationContext, PollResult, Poller, ResourceConfig,
    ResourceHandler, ResourceState, Result, await_convergence,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "azure-cosmosdb-account";

const NAMESPACE: &str = "Microsoft.DocumentDB";
const TYPE: &str = "databaseAccounts";
const API_VERSION: &str = "2024-08-15";

const PENDING: [&str; 6] = [
    "Creating",
    "Updating",
    "Deleting",
    "Initializing",
    "Dequeued",
    "Enqueued",
];
const POLL_INTERVAL: Duration = Duration::from_secs(15);
const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// New locations take a while to show up in reads at all
const CREATE_DELAY: Duration = Duration::from_secs(30);

/// Desired state of a Cosmos DB account
#[derive(Debug, Clone, Deserialize)]
pub struct CosmosDbAccountConfig {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_consistency")]
    pub consistency_level: String,
    /// Replication locations in failover priority order; defaults to `location`
    #[serde(default)]
    pub geo_locations: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

fn default_kind() -> String {
    "GlobalDocumentDB".to_string()
}

fn default_consistency() -> String {
    "Session".to_string()
}

impl CosmosDbAccountConfig {
    fn locations(&self) -> Vec<String> {
        if self.geo_locations.is_empty() {
            vec![self.location.clone()]
        } else {
            self.geo_locations.clone()
        }
    }

    fn body(&self) -> Value {
        let locations: Vec<Value> = self
            .locations()
            .iter()
            .enumerate()
            .map(|(priority, name)| json!({ "locationName": name, "failoverPriority": priority }))
            .collect();

        json!({
            "location": self.location,
            "kind": self.kind,
            "tags": self.tags,
            "properties": {
                "databaseAccountOfferType": "Standard",
                "consistencyPolicy": { "defaultConsistencyLevel": self.consistency_level },
                "locations": locations,
            },
        })
    }
}

fn normalize_location(location: &str) -> String {
    location.replace(' ', "").to_lowercase()
}

/// Poll function that folds per-location provisioning into one label
pub struct CosmosLocationPoller<'a> {
    api: &'a dyn ManagementApi,
    path: String,
    desired: Vec<String>,
}

impl<'a> CosmosLocationPoller<'a> {
    pub fn new(api: &'a dyn ManagementApi, id: &ResourceId, desired: &[String]) -> Self {
        Self {
            api,
            path: id.path(),
            desired: desired.to_vec(),
        }
    }
}

/// Label of an account body: the first in-progress location state,
/// `Updating` while a desired location is missing, otherwise the last
/// location state seen
pub fn account_state(body: &Value, desired: &[String]) -> Option<String> {
    let properties = body.get("properties")?;
    let locations: Vec<&Value> = ["readLocations", "writeLocations"]
        .iter()
        .filter_map(|key| properties.get(*key).and_then(Value::as_array))
        .flatten()
        .collect();

    let mut state = "Succeeded";
    for location in &locations {
        if let Some(s) = provisioning_state_of(location) {
            state = s;
            if matches!(s, "Creating" | "Updating" | "Deleting") {
                break;
            }
        }
    }

    let present: Vec<String> = locations
        .iter()
        .filter_map(|l| l.get("locationName").and_then(Value::as_str))
        .map(normalize_location)
        .collect();
    if desired
        .iter()
        .any(|d| !present.contains(&normalize_location(d)))
    {
        return Some("Updating".to_string());
    }

    Some(state.to_string())
}

fn provisioning_state_of(location: &Value) -> Option<&str> {
    location.get("provisioningState").and_then(Value::as_str)
}

#[async_trait]
impl Poller for CosmosLocationPoller<'_> {
    type Object = Value;

    async fn poll(&self) -> PollResult<Value> {
        match self.api.get(&self.path, API_VERSION).await {
            Ok(body) => {
                let state = account_state(&body, &self.desired);
                Ok(Observation::from_state(body, state))
            }
            Err(e) if e.is_not_found() => Ok(Observation::absent()),
            Err(e) => Err(e.into_poll_error()),
        }
    }
}

/// Handler for `azure-cosmosdb-account` resources
pub struct CosmosDbAccount {
    api: Arc<dyn ManagementApi>,
}

impl CosmosDbAccount {
    pub fn new(api: Arc<dyn ManagementApi>) -> Self {
        Self { api }
    }

    fn id(&self, config: &CosmosDbAccountConfig) -> ResourceId {
        ResourceId::new(
            self.api.subscription_id(),
            &config.resource_group,
            NAMESPACE,
            TYPE,
            &config.name,
        )
    }

    async fn apply(
        &self,
        config: &ResourceConfig,
        ctx: &OperationContext,
        is_new: bool,
    ) -> Result<ResourceState> {
        let desired: CosmosDbAccountConfig = parse_config(config)?;
        let id = self.id(&desired);

        if is_new {
            ensure_absent(self.api.as_ref(), &id, API_VERSION).await?;
        }
        tracing::info!(%id, locations = ?desired.locations(), "Applying Cosmos DB account");
        self.api.put(&id.path(), API_VERSION, &desired.body()).await?;

        // Creates wait out the location delay; updates confirm twice instead.
        let mut spec = ctx
            .convergence(format!("cosmosdb account {}", id.name))
            .pending(PENDING)
            .target(["Succeeded"])
            .min_poll_interval(POLL_INTERVAL);
        spec = if is_new {
            spec.initial_delay(CREATE_DELAY)
        } else {
            spec.continuous_target_occurrences(2)
        };
        let spec = spec.build()?;

        let poller = CosmosLocationPoller::new(self.api.as_ref(), &id, &desired.locations());
        let converged = await_convergence(&spec, &poller, ctx.cancel()).await?;
        let body = converged
            .object
            .ok_or_else(|| CloudError::ResourceNotFound(id.to_string()))?;
        Ok(to_resource_state(&id, RESOURCE_TYPE, &body))
    }
}

#[async_trait]
impl ResourceHandler for CosmosDbAccount {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn create(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        self.apply(config, ctx, true).await
    }

    async fn read(&self, id: &str, _ctx: &OperationContext) -> Result<Option<ResourceState>> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        read_state(self.api.as_ref(), &id, API_VERSION, RESOURCE_TYPE).await
    }

    async fn update(&self, config: &ResourceConfig, ctx: &OperationContext) -> Result<ResourceState> {
        self.apply(config, ctx, false).await
    }

    async fn delete(&self, id: &str, ctx: &OperationContext) -> Result<()> {
        let id = ResourceId::parse_as(id, NAMESPACE, TYPE)?;
        tracing::info!(%id, "Deleting Cosmos DB account");
        let session = ctx
            .convergence(format!("cosmosdb account {}", id.name))
            .min_poll_interval(DELETE_POLL_INTERVAL);
        delete_and_wait(self.api.as_ref(), &id, API_VERSION, ctx, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(locations: &[&str]) -> Vec<String> {
        locations.iter().map(|s| s.to_string()).collect()
    }

    fn account(locations: Value) -> Value {
        json!({ "properties": { "provisioningState": "Succeeded", "readLocations": locations } })
    }

    #[test]
    fn test_in_progress_location_wins() {
        let body = account(json!([
            { "locationName": "West Europe", "provisioningState": "Succeeded" },
            { "locationName": "North Europe", "provisioningState": "Creating" },
        ]));
        let state = account_state(&body, &desired(&["westeurope", "North Europe"]));
        assert_eq!(state.as_deref(), Some("Creating"));
    }

    #[test]
    fn test_missing_desired_location_is_updating() {
        let body = account(json!([
            { "locationName": "West Europe", "provisioningState": "Succeeded" },
        ]));
        let state = account_state(&body, &desired(&["West Europe", "East US"]));
        assert_eq!(state.as_deref(), Some("Updating"));
    }

    #[test]
    fn test_all_locations_ready() {
        let body = account(json!([
            { "locationName": "West Europe", "provisioningState": "Succeeded" },
        ]));
        assert_eq!(
            account_state(&body, &desired(&["West Europe"])).as_deref(),
            Some("Succeeded")
        );
        assert_eq!(account_state(&json!({}), &desired(&["West Europe"])), None);
    }

    #[test]
    fn test_body_location_priorities() {
        let config: CosmosDbAccountConfig = serde_json::from_value(json!({
            "name": "acct1",
            "resource_group": "rg1",
            "location": "westeurope",
            "geo_locations": ["westeurope", "northeurope"]
        }))
        .unwrap();
        let body = config.body();
        assert_eq!(body["kind"], "GlobalDocumentDB");
        assert_eq!(body["properties"]["locations"][1]["locationName"], "northeurope");
        assert_eq!(body["properties"]["locations"][1]["failoverPriority"], 1);
    }
}
