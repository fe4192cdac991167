//! Deployer API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub supported_rounds: RoundSemantics,
}

/// What each round number does
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSemantics {
    pub create: String,
    pub update: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Attachment as sent by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub name: String,
    /// Usually a `data:` URI
    pub url: String,
}

/// Body of `POST /api/deploy`.
///
/// Every field is optional on the wire so that missing values reach request
/// validation and are reported as `InvalidRequest` instead of a generic
/// deserialization rejection.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DeployPayload {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub round: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    #[serde(default)]
    pub evaluation_url: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl std::fmt::Debug for DeployPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployPayload")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("round", &self.round)
            .field("email", &self.email)
            .field("task", &self.task)
            .field("brief", &self.brief)
            .field("checks", &self.checks.len())
            .field("attachments", &self.attachments.len())
            .field("evaluation_url", &self.evaluation_url)
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Immediate acknowledgment of an accepted deploy request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployAccepted {
    pub status: String,
    pub deployment_id: Uuid,
    pub task: String,
    pub round: u32,
    pub nonce: String,
}

/// Error body for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind, e.g. `InvalidRequest`
    pub error: String,
    pub message: String,
}

/// Task listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

/// One known task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task: String,
    pub last_round: u32,
    pub repository_url: Option<String>,
    pub state: String,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}
