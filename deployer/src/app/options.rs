//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::config::Settings;
use crate::deploy::orchestrator::OrchestratorOptions;
use crate::generate::aipipe::ApiFormat;
use crate::generate::GenerationOptions;
use crate::notify::NotifierOptions;
use crate::repo::github::GitHubOptions;
use crate::repo::RetryOptions;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Shared secret for inbound requests
    pub secret: SecretString,

    /// Generation backend
    pub aipipe: AiPipeOptions,

    /// Generation settings
    pub generation: GenerationOptions,

    /// GitHub host
    pub github: GitHubOptions,

    /// Repository call retries
    pub repo_retry: RetryOptions,

    /// Notification delivery
    pub notifier: NotifierOptions,

    /// Round orchestration
    pub orchestrator: OrchestratorOptions,
}

impl AppOptions {
    pub fn from_settings(settings: Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: settings.shutdown_grace,
            },
            server: ServerOptions {
                host: settings.host,
                port: settings.port,
            },
            secret: settings.secret,
            aipipe: AiPipeOptions {
                base_url: settings.aipipe_base_url,
                api_key: settings.aipipe_api_key,
                format: settings.aipipe_api_format,
            },
            generation: GenerationOptions {
                app_model: settings.generation_model,
                readme_model: settings.readme_model,
                timeout: settings.generation_timeout,
            },
            github: GitHubOptions {
                api_url: settings.github_api_url,
                token: settings.github_token,
                owner: settings.github_username,
                pages_wait_attempts: settings.pages_wait_attempts,
                pages_wait_interval: settings.pages_wait_interval,
                timeout: RetryOptions::default().call_timeout,
            },
            repo_retry: RetryOptions::default(),
            notifier: NotifierOptions {
                max_retries: settings.notify_max_retries,
                ..Default::default()
            },
            orchestrator: OrchestratorOptions {
                wait_for_pages: settings.pages_wait_attempts > 0,
            },
        }
    }
}

/// Lifecycle options for the deployer
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// AIPipe connection options
#[derive(Debug)]
pub struct AiPipeOptions {
    pub base_url: String,
    pub api_key: SecretString,
    pub format: ApiFormat,
}
