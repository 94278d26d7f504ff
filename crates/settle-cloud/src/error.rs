//! Resource operation error types

use crate::convergence::ConvergeError;
use thiserror::Error;

/// Resource operation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Convergence(#[from] ConvergeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// True when the wait ended because the deadline passed. The mutation may
    /// or may not have been applied.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Convergence(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
