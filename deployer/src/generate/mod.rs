//! Code generation
//!
//! [`GenerationClient`] turns a brief into a single-file HTML app through an
//! [`LlmBackend`]. It bounds every call with a hard timeout and classifies
//! failures, but never retries: a failed generation is reported as a failed
//! round.

pub mod aipipe;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::request::Attachment;

/// Generation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation backend is rate limiting: {0}")]
    RateLimited(String),

    #[error("generation backend error: {0}")]
    BackendError(String),

    #[error("generation returned no usable output: {0}")]
    EmptyOutput(String),
}

/// A text-completion backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Complete a single prompt with the given model
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Generation settings
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Model used for the app
    pub app_model: String,

    /// Model used for the README
    pub readme_model: String,

    /// Hard timeout for one backend call
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            app_model: "gpt-4o".to_string(),
            readme_model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Inputs for one app generation
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub brief: &'a str,
    pub checks: &'a [String],
    pub attachments: &'a [Attachment],
    pub prior_code: Option<&'a str>,
}

/// Generation client
pub struct GenerationClient {
    backend: Arc<dyn LlmBackend>,
    options: GenerationOptions,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn LlmBackend>, options: GenerationOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Generate the app's `index.html`
    pub async fn generate(&self, input: GenerationInput<'_>) -> Result<String, GenerationError> {
        let prompt = prompt::app_prompt(
            input.brief,
            input.checks,
            input.attachments,
            input.prior_code,
        );
        info!(
            "Generating app with {} (prior code: {})",
            self.options.app_model,
            input.prior_code.is_some()
        );

        let raw = self.complete(&self.options.app_model, &prompt).await?;
        let code = prompt::clean_output(&raw);
        if !prompt::looks_like_html(&code) {
            return Err(GenerationError::EmptyOutput(format!(
                "expected an HTML document, got {} bytes",
                code.len()
            )));
        }

        debug!("Generated {} bytes of HTML", code.len());
        Ok(code)
    }

    /// Generate a README, falling back to a template on any failure
    pub async fn generate_readme(&self, project: &str, brief: &str, round: u32) -> String {
        let prompt = prompt::readme_prompt(project, brief, round > 1);
        match self.complete(&self.options.readme_model, &prompt).await {
            Ok(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
            Ok(_) => {
                warn!("README generation returned nothing, using template");
                prompt::fallback_readme(project, brief, round)
            }
            Err(e) => {
                warn!("README generation failed, using template: {}", e);
                prompt::fallback_readme(project, brief, round)
            }
        }
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.options.timeout, self.backend.complete(model, prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.options.timeout)),
        }
    }
}
