//! Azure Resource Manager resources for settle
//!
//! This crate implements `ResourceHandler` for a handful of Azure resource
//! types. Every mutation is followed by a convergence session that polls the
//! resource until it settles, bounded by the operation's deadline.
//!
//! # Resources
//!
//! - Azure Cache for Redis (`azure-redis-cache`)
//! - Cosmos DB accounts (`azure-cosmosdb-account`)
//! - Log Analytics clusters (`azure-log-analytics-cluster`)
//! - App Configuration stores (`azure-app-configuration`), including the
//!   purge and name-availability wait after delete
//!
//! # Requirements
//!
//! `AZURE_ACCESS_TOKEN` and `AZURE_SUBSCRIPTION_ID` env vars;
//! `AZURE_RESOURCE_MANAGER_ENDPOINT` overrides the public cloud endpoint.
//!
//! # Example
//!
//! ```ignore
//! use settle_cloud::{OperationContext, OperationKind, ResourceConfig, ResourceHandler};
//! use settle_cloud_azure::{ArmClient, RedisCache};
//! use std::sync::Arc;
//!
//! let api = Arc::new(ArmClient::from_env()?);
//! let redis = RedisCache::new(api);
//!
//! let settings = settle_config::Settings::load()?;
//! let ctx = OperationContext::from_settings(OperationKind::Create, &settings);
//! let state = redis.create(&config, &ctx).await?;
//! ```

pub mod client;
pub mod error;
pub mod id;
pub mod resources;

pub use client::{ArmClient, ArmConfig, ManagementApi};
pub use error::{AzureError, Result};
pub use id::ResourceId;
pub use resources::{
    AppConfigurationStore, CosmosDbAccount, DeletionPoller, LogAnalyticsCluster,
    ProvisioningStatePoller, RedisCache,
};
