//! Deployment result models

use openapi_client::models::{EvaluationNotification, NotificationError};
use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;
use crate::models::request::{DeployRequest, ValidatedRequest};

/// Terminal status of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failure,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failure => "failure",
        }
    }
}

/// Why a round failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub status: DeploymentStatus,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub email: String,
    pub checks: Vec<String>,
    /// Public hosting URL
    pub repository_url: Option<String>,
    /// Repository web page
    pub repo_url: Option<String>,
    pub commit_sha: Option<String>,
    pub pages_ready: bool,
    pub error: Option<Failure>,
}

impl DeploymentResult {
    /// Failure for a request that never got past admission
    pub fn rejected(request: &DeployRequest, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Failure,
            task: request.task.clone(),
            round: u32::try_from(request.round).unwrap_or(0),
            nonce: request.nonce.clone(),
            email: request.email.clone(),
            checks: request.checks.clone(),
            repository_url: None,
            repo_url: None,
            commit_sha: None,
            pages_ready: false,
            error: Some(Failure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Successful round
    pub fn success(request: &ValidatedRequest, published: Published) -> Self {
        Self {
            status: DeploymentStatus::Success,
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            email: request.email.clone(),
            checks: request.checks.clone(),
            repository_url: Some(published.public_url),
            repo_url: Some(published.repo_url),
            commit_sha: Some(published.commit_sha),
            pages_ready: published.pages_ready,
            error: None,
        }
    }

    /// Failed round; `repository_url` is whatever was known before the failure
    pub fn failed(
        request: &ValidatedRequest,
        kind: ErrorKind,
        message: impl Into<String>,
        repository_url: Option<String>,
    ) -> Self {
        Self {
            status: DeploymentStatus::Failure,
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            email: request.email.clone(),
            checks: request.checks.clone(),
            repository_url,
            repo_url: None,
            commit_sha: None,
            pages_ready: false,
            error: Some(Failure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    /// Error kind, if the round failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Callback payload for this result
    pub fn to_notification(&self) -> EvaluationNotification {
        EvaluationNotification {
            email: self.email.clone(),
            task: self.task.clone(),
            round: self.round,
            nonce: self.nonce.clone(),
            status: self.status.as_str().to_string(),
            repository_url: self.repository_url.clone(),
            repo_url: self.repo_url.clone(),
            pages_url: self.repository_url.clone(),
            commit_sha: self.commit_sha.clone(),
            pages_ready: self.pages_ready,
            checks: self.checks.clone(),
            error: self.error.as_ref().map(|e| NotificationError {
                kind: e.kind.as_str().to_string(),
                message: e.message.clone(),
            }),
        }
    }
}

/// What a successful publish produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub public_url: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_ready: bool,
}
