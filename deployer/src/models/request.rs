//! Deploy request models

use openapi_server::models::{AttachmentPayload, DeployPayload};
use url::Url;

use crate::errors::DeployerError;

/// An attachment available to generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// Inline `data:` URI or a link
    pub url: String,
}

impl From<AttachmentPayload> for Attachment {
    fn from(p: AttachmentPayload) -> Self {
        Self {
            name: p.name,
            url: p.url,
        }
    }
}

/// A deploy request as received, minus the shared secret.
///
/// Nothing here is trusted yet; see [`DeployRequest::validate`].
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub round: i64,
    pub email: String,
    pub task: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub evaluation_url: String,
    pub nonce: String,
}

impl From<DeployPayload> for DeployRequest {
    fn from(p: DeployPayload) -> Self {
        Self {
            round: p.round.unwrap_or_default(),
            email: p.email.unwrap_or_default(),
            task: p.task.unwrap_or_default(),
            brief: p.brief.unwrap_or_default(),
            checks: p.checks,
            attachments: p.attachments.into_iter().map(Attachment::from).collect(),
            evaluation_url: p.evaluation_url.unwrap_or_default(),
            nonce: p.nonce.unwrap_or_default(),
        }
    }
}

/// Whether a round creates or updates the published app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    Create,
    Update,
}

/// A request that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// Task identifier exactly as the caller sent it, echoed back
    pub task: String,
    /// Sanitized task: repository name and lock key
    pub repo_name: String,
    pub round: u32,
    pub email: String,
    pub brief: String,
    pub checks: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub evaluation_url: Url,
    pub nonce: String,
}

impl ValidatedRequest {
    /// Mode requested by the caller; the orchestrator may still fall back to
    /// creation when it has never seen the task
    pub fn requested_mode(&self) -> RoundMode {
        if self.round == 1 {
            RoundMode::Create
        } else {
            RoundMode::Update
        }
    }
}

impl DeployRequest {
    /// Check the request shape and sanitize the task name
    pub fn validate(&self) -> Result<ValidatedRequest, DeployerError> {
        let repo_name = sanitize_task(&self.task);
        if repo_name.is_empty() {
            return Err(DeployerError::ValidationError(format!(
                "task '{}' is empty or has no valid repository-name characters",
                self.task
            )));
        }

        if self.round < 1 {
            return Err(DeployerError::ValidationError(format!(
                "round must be >= 1, got {}",
                self.round
            )));
        }
        let round = u32::try_from(self.round).map_err(|_| {
            DeployerError::ValidationError(format!("round {} is out of range", self.round))
        })?;

        if self.brief.trim().is_empty() {
            return Err(DeployerError::ValidationError("brief is required".to_string()));
        }

        if self.evaluation_url.trim().is_empty() {
            return Err(DeployerError::ValidationError(
                "evaluation_url is required".to_string(),
            ));
        }
        let evaluation_url = Url::parse(self.evaluation_url.trim()).map_err(|e| {
            DeployerError::ValidationError(format!("evaluation_url is not a valid URL: {}", e))
        })?;
        if !matches!(evaluation_url.scheme(), "http" | "https") || !evaluation_url.has_host() {
            return Err(DeployerError::ValidationError(format!(
                "evaluation_url must be an absolute http(s) URL, got '{}'",
                self.evaluation_url
            )));
        }

        Ok(ValidatedRequest {
            task: self.task.clone(),
            repo_name,
            round,
            email: self.email.clone(),
            brief: self.brief.clone(),
            checks: self.checks.clone(),
            attachments: self.attachments.clone(),
            evaluation_url,
            nonce: self.nonce.clone(),
        })
    }
}

/// Map a task identifier onto the repository-name charset.
///
/// Anything outside `[A-Za-z0-9-]` becomes `-`, runs of `-` collapse, edges
/// are trimmed and the result is lower-cased.
pub fn sanitize_task(task: &str) -> String {
    let mut out = String::with_capacity(task.len());
    for c in task.chars() {
        let c = if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}
