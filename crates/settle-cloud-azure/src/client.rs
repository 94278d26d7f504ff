//! Azure Resource Manager client
//!
//! Thin JSON-over-HTTPS access to the management plane. Long-running
//! operations are not followed here: callers wait on the resource itself
//! through a convergence session.

use crate::error::{AzureError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Management-plane operations used by resource handlers
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// Subscription new resources are created in
    fn subscription_id(&self) -> &str;

    async fn get(&self, path: &str, api_version: &str) -> Result<Value>;

    async fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value>;

    async fn patch(&self, path: &str, api_version: &str, body: &Value) -> Result<Value>;

    async fn delete(&self, path: &str, api_version: &str) -> Result<()>;

    /// POST an action; an empty response body yields `Value::Null`
    async fn post(&self, path: &str, api_version: &str, body: &Value) -> Result<Value>;
}

/// Connection settings for `ArmClient`
#[derive(Debug, Clone)]
pub struct ArmConfig {
    pub access_token: String,
    pub subscription_id: String,
    pub endpoint: String,
}

impl ArmConfig {
    pub fn new(access_token: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            subscription_id: subscription_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Create ArmConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let access_token = std::env::var("AZURE_ACCESS_TOKEN")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_ACCESS_TOKEN".to_string()))?;
        let subscription_id = std::env::var("AZURE_SUBSCRIPTION_ID")
            .map_err(|_| AzureError::MissingEnvVar("AZURE_SUBSCRIPTION_ID".to_string()))?;

        let mut config = Self::new(access_token, subscription_id);
        if let Ok(endpoint) = std::env::var("AZURE_RESOURCE_MANAGER_ENDPOINT") {
            config = config.with_endpoint(endpoint);
        }
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

/// reqwest-backed `ManagementApi`
pub struct ArmClient {
    client: reqwest::Client,
    config: ArmConfig,
}

impl ArmClient {
    pub fn new(config: ArmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ArmConfig::from_env()?))
    }

    fn request(&self, method: reqwest::Method, path: &str, api_version: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.endpoint, path);
        tracing::debug!(%method, %url, api_version, "ARM request");
        self.client
            .request(method, url)
            .bearer_auth(&self.config.access_token)
            .query(&[("api-version", api_version)])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_slice::<ArmErrorResponse>(&body) {
                Ok(parsed) => (parsed.error.code, parsed.error.message),
                Err(_) => (
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown")
                        .to_string(),
                    String::from_utf8_lossy(&body).into_owned(),
                ),
            };
            return Err(AzureError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ManagementApi for ArmClient {
    fn subscription_id(&self) -> &str {
        &self.config.subscription_id
    }

    async fn get(&self, path: &str, api_version: &str) -> Result<Value> {
        self.send(self.request(reqwest::Method::GET, path, api_version))
            .await
    }

    async fn put(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        self.send(self.request(reqwest::Method::PUT, path, api_version).json(body))
            .await
    }

    async fn patch(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        self.send(self.request(reqwest::Method::PATCH, path, api_version).json(body))
            .await
    }

    async fn delete(&self, path: &str, api_version: &str) -> Result<()> {
        self.send(self.request(reqwest::Method::DELETE, path, api_version))
            .await?;
        Ok(())
    }

    async fn post(&self, path: &str, api_version: &str, body: &Value) -> Result<Value> {
        self.send(self.request(reqwest::Method::POST, path, api_version).json(body))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorResponse {
    error: ArmErrorBody,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    code: String,
    message: String,
}
