//! Environment configuration
//!
//! Settings come from process environment variables. A `.env` file in the
//! working directory is loaded first when present; real environment
//! variables win over it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;

use crate::errors::DeployerError;
use crate::generate::aipipe::ApiFormat;
use crate::logs::LogLevel;

/// Deployer settings
#[derive(Debug)]
pub struct Settings {
    /// Shared secret callers must present
    pub secret: SecretString,
    pub github_token: SecretString,
    pub github_username: String,
    pub aipipe_api_key: SecretString,

    pub host: String,
    pub port: u16,

    pub aipipe_base_url: String,
    pub aipipe_api_format: ApiFormat,
    pub generation_model: String,
    pub readme_model: String,
    pub generation_timeout: Duration,

    pub github_api_url: String,
    pub pages_wait_attempts: u32,
    pub pages_wait_interval: Duration,

    pub notify_max_retries: u32,

    pub log_level: LogLevel,
    pub log_json: bool,
    pub log_dir: Option<PathBuf>,

    pub shutdown_grace: Duration,
}

impl Settings {
    /// Load `.env` (if any) and read settings from the environment
    pub fn from_env() -> Result<Self, DeployerError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(DeployerError::ConfigError(format!("invalid .env file: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DeployerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        Ok(Self {
            secret: env.secret("MY_SECRET")?,
            github_token: env.secret("GITHUB_TOKEN")?,
            github_username: env.required("GITHUB_USERNAME")?,
            aipipe_api_key: env.secret("AIPIPE_API_KEY")?,

            host: env.or("HOST", "0.0.0.0"),
            port: env.parsed("PORT", 8000)?,

            aipipe_base_url: env.or("AIPIPE_BASE_URL", "https://aipipe.org"),
            aipipe_api_format: env.parsed("AIPIPE_API_FORMAT", ApiFormat::Responses)?,
            generation_model: env.or("GENERATION_MODEL", "gpt-4o"),
            readme_model: env.or("README_MODEL", "gpt-4o-mini"),
            generation_timeout: Duration::from_secs(env.parsed("GENERATION_TIMEOUT_SECS", 120)?),

            github_api_url: env.or("GITHUB_API_URL", "https://api.github.com"),
            pages_wait_attempts: env.parsed("PAGES_WAIT_ATTEMPTS", 30)?,
            pages_wait_interval: Duration::from_secs(env.parsed("PAGES_WAIT_INTERVAL_SECS", 10)?),

            notify_max_retries: env.parsed("NOTIFY_MAX_RETRIES", 3)?,

            log_level: env.parsed("LOG_LEVEL", LogLevel::Info)?,
            log_json: env.flag("LOG_JSON")?,
            log_dir: env.optional("LOG_DIR").map(PathBuf::from),

            shutdown_grace: Duration::from_secs(env.parsed("SHUTDOWN_GRACE_SECS", 30)?),
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, DeployerError> {
        self.optional(key)
            .ok_or_else(|| DeployerError::ConfigError(format!("{} is required", key)))
    }

    fn secret(&self, key: &str) -> Result<SecretString, DeployerError> {
        self.required(key).map(SecretString::from)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, DeployerError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| DeployerError::ConfigError(format!("{}='{}': {}", key, raw, e))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, DeployerError> {
        match self.optional(key).map(|v| v.to_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(DeployerError::ConfigError(format!("{}='{}' is not a boolean", key, v))),
            },
        }
    }
}
