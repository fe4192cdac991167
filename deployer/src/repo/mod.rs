//! Repository management
//!
//! [`RepositoryHost`] is the hosting-provider adapter. [`RepositoryManager`]
//! wraps it with a per-call timeout and bounded retry for transient errors.
//! Every host operation is idempotent: "already exists" and "already
//! enabled" are successes, so a round can safely repeat steps that a
//! previous, partially failed round already performed.

pub mod files;
pub mod github;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::errors::DeployerError;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Repository operation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// Network failure, timeout or provider 5xx
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Provider refused the operation
    #[error("provider rejected {operation} ({status}): {message}")]
    Rejected {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("unexpected provider response: {0}")]
    Invalid(String),
}

impl RepoError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RepoError::Transient(_) | RepoError::Timeout { .. })
    }

    /// Classify a transport error for `operation`
    pub fn from_http(operation: &str, err: DeployerError) -> Self {
        if err.is_transient() {
            return RepoError::Transient(format!("{}: {}", operation, err));
        }
        match err {
            DeployerError::Status { status, body } => RepoError::Rejected {
                operation: operation.to_string(),
                status,
                message: body,
            },
            other => RepoError::Invalid(format!("{}: {}", operation, other)),
        }
    }
}

/// A repository on the hosting provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoHandle {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    /// Repository web page
    pub html_url: String,
}

/// A file to write into a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Result of `ensure_repository`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredRepo {
    pub handle: RepoHandle,
    /// False when the repository already existed
    pub created: bool,
}

/// Hosting provider capabilities
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Return the repository, creating it if needed
    async fn ensure_repository(&self, name: &str) -> Result<EnsuredRepo, RepoError>;

    /// Create or overwrite files; returns the SHA of the last commit
    async fn write_files(
        &self,
        repo: &RepoHandle,
        files: &[RepoFile],
        message: &str,
    ) -> Result<String, RepoError>;

    /// Enable static hosting from the default branch; returns the public URL
    async fn enable_hosting(&self, repo: &RepoHandle) -> Result<String, RepoError>;

    /// Read a file from the default branch
    async fn read_file(&self, repo: &RepoHandle, path: &str) -> Result<Option<String>, RepoError>;

    /// Wait until the public URL serves content. Best-effort, never an error.
    async fn await_live(&self, _public_url: &str) -> bool {
        true
    }
}

/// Retry settings for provider calls
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts per operation, including the first
    pub max_attempts: u32,

    /// Client-side timeout for one attempt
    pub call_timeout: Duration,

    /// Delay between attempts
    pub cooldown: CooldownOptions,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_secs(30),
            cooldown: CooldownOptions {
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
            },
        }
    }
}

/// Repository manager
pub struct RepositoryManager {
    host: Arc<dyn RepositoryHost>,
    options: RetryOptions,
}

impl RepositoryManager {
    pub fn new(host: Arc<dyn RepositoryHost>, options: RetryOptions) -> Self {
        Self { host, options }
    }

    pub async fn ensure_repository(&self, name: &str) -> Result<EnsuredRepo, RepoError> {
        self.with_retry("ensure_repository", || self.host.ensure_repository(name))
            .await
    }

    pub async fn write_files(
        &self,
        repo: &RepoHandle,
        files: &[RepoFile],
        message: &str,
    ) -> Result<String, RepoError> {
        self.with_retry("write_files", || self.host.write_files(repo, files, message))
            .await
    }

    pub async fn enable_hosting(&self, repo: &RepoHandle) -> Result<String, RepoError> {
        self.with_retry("enable_hosting", || self.host.enable_hosting(repo))
            .await
    }

    pub async fn read_file(
        &self,
        repo: &RepoHandle,
        path: &str,
    ) -> Result<Option<String>, RepoError> {
        self.with_retry("read_file", || self.host.read_file(repo, path))
            .await
    }

    /// Not retried or timed out here; the host bounds its own polling
    pub async fn await_live(&self, public_url: &str) -> bool {
        self.host.await_live(public_url).await
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RepoError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepoError>>,
    {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.options.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RepoError::Timeout {
                    operation: operation.to_string(),
                    timeout: self.options.call_timeout,
                }),
            };

            match result {
                Ok(value) => {
                    debug!("{} succeeded on attempt {}", operation, attempt);
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = calc_exp_backoff(&self.options.cooldown, attempt - 1);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
