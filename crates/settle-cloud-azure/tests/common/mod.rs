#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use settle_cloud_azure::{AzureError, ManagementApi, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const SUBSCRIPTION: &str = "0000";

/// One scripted ARM response
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
}

/// In-memory `ManagementApi` replaying scripted responses per method and path
///
/// The last reply for a route repeats once the script runs out.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String, Option<Value>)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: &str, path: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), replies.into());
        self
    }

    /// Recorded `(method, path)` pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(m, p, _)| (m.clone(), p.clone()))
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    /// Body of the most recent call to `method`
    pub fn last_body(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(m, _, _)| m == method)
            .and_then(|(_, _, body)| body.clone())
    }

    fn reply(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), body.cloned()));

        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .get_mut(&(method.to_string(), path.to_string()))
            .unwrap_or_else(|| panic!("unexpected {} {}", method, path));
        let reply = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };

        match reply {
            Reply::Json(value) => Ok(value),
            Reply::Status(status) => Err(AzureError::Api {
                status,
                code: "Scripted".to_string(),
                message: format!("{} {}", method, path),
            }),
        }
    }
}

#[async_trait]
impl ManagementApi for MockApi {
    fn subscription_id(&self) -> &str {
        SUBSCRIPTION
    }

    async fn get(&self, path: &str, _api_version: &str) -> Result<Value> {
        self.reply("GET", path, None)
    }

    async fn put(&self, path: &str, _api_version: &str, body: &Value) -> Result<Value> {
        self.reply("PUT", path, Some(body))
    }

    async fn patch(&self, path: &str, _api_version: &str, body: &Value) -> Result<Value> {
        self.reply("PATCH", path, Some(body))
    }

    async fn delete(&self, path: &str, _api_version: &str) -> Result<()> {
        self.reply("DELETE", path, None).map(|_| ())
    }

    async fn post(&self, path: &str, _api_version: &str, body: &Value) -> Result<Value> {
        self.reply("POST", path, Some(body))
    }
}

/// ARM body with the given provisioning state
pub fn provisioning(state: &str) -> Reply {
    Reply::Json(serde_json::json!({
        "name": "resource",
        "location": "westeurope",
        "properties": { "provisioningState": state }
    }))
}

/// ARM body without a provisioning state
pub fn unlabelled() -> Reply {
    Reply::Json(serde_json::json!({ "name": "resource", "properties": {} }))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
