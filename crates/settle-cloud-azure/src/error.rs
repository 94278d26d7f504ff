//! Azure provider error types

use settle_cloud::{CloudError, PollError, PollErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid resource ID: {0}")]
    InvalidResourceId(String),

    #[error("ARM request failed ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AzureError {
    /// HTTP status of the failed request, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            AzureError::Api { status, .. } => Some(*status),
            AzureError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Classify this error for a convergence session
    pub fn into_poll_error(self) -> PollError {
        let kind = match &self {
            AzureError::Json(_) => PollErrorKind::Decode,
            AzureError::Http(e) if e.is_decode() => PollErrorKind::Decode,
            AzureError::Http(e) if e.status().is_none() => PollErrorKind::Transport,
            _ => match self.status() {
                Some(404) => PollErrorKind::NotFound,
                Some(409) => PollErrorKind::Conflict,
                Some(429) => PollErrorKind::Throttled,
                _ => PollErrorKind::Api,
            },
        };
        PollError::new(kind, self.to_string()).with_source(self)
    }
}

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err.status() {
            Some(404) => CloudError::ResourceNotFound(err.to_string()),
            Some(409) => CloudError::ResourceAlreadyExists(err.to_string()),
            Some(401) | Some(403) => CloudError::AuthenticationFailed(err.to_string()),
            _ => match err {
                AzureError::MissingEnvVar(_) | AzureError::InvalidResourceId(_) => {
                    CloudError::InvalidConfig(err.to_string())
                }
                AzureError::Json(e) => CloudError::Json(e),
                other => CloudError::ApiError(other.to_string()),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
