//! Error types for the deployer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Notification delivery failed after {attempts} attempt(s): {message}")]
    NotificationDeliveryFailed { attempts: u32, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployerError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DeployerError::Status { status, .. } => Some(*status),
            DeployerError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Transport failures and 5xx responses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            DeployerError::Status { status, .. } => *status >= 500,
            DeployerError::HttpError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for DeployerError {
    fn from(err: anyhow::Error) -> Self {
        DeployerError::Internal(err.to_string())
    }
}

/// Failure classes reported in a deployment result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRequest,
    TaskBusy,
    GenerationFailed,
    RepositoryOperationFailed,
    NotificationDeliveryFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::TaskBusy => "TaskBusy",
            ErrorKind::GenerationFailed => "GenerationFailed",
            ErrorKind::RepositoryOperationFailed => "RepositoryOperationFailed",
            ErrorKind::NotificationDeliveryFailed => "NotificationDeliveryFailed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
