//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::app::options::AiPipeOptions;
use crate::deploy::locks::TaskLocks;
use crate::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::deploy::registry::TaskRegistry;
use crate::errors::DeployerError;
use crate::generate::aipipe::AiPipeBackend;
use crate::generate::{GenerationClient, GenerationOptions};
use crate::notify::{Delivery, HttpNotifier, NotificationDispatcher, Notifier, NotifierOptions};
use crate::repo::github::{GitHubHost, GitHubOptions};
use crate::repo::{RepositoryManager, RetryOptions};

/// Extra HTTP time allowed past the generation deadline
const BACKEND_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Main application state
pub struct AppState {
    /// Round orchestrator
    pub orchestrator: Arc<Orchestrator>,

    /// Notification delivery
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Returns the state and the receiving end of the notification queue.
    pub fn init(
        aipipe: AiPipeOptions,
        generation: GenerationOptions,
        github: GitHubOptions,
        repo_retry: RetryOptions,
        notifier: NotifierOptions,
        orchestrator: OrchestratorOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Delivery>), DeployerError> {
        info!("Initializing application state...");

        let backend = AiPipeBackend::new(
            &aipipe.base_url,
            aipipe.api_key,
            aipipe.format,
            generation.timeout + BACKEND_TIMEOUT_SLACK,
        )?;
        let generator = GenerationClient::new(Arc::new(backend), generation);

        let host = GitHubHost::new(github)?;
        let repos = RepositoryManager::new(Arc::new(host), repo_retry);

        let (dispatcher, deliveries) = NotificationDispatcher::new();
        let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(notifier)?);

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(TaskLocks::new()),
            Arc::new(TaskRegistry::new()),
            generator,
            repos,
            Arc::new(dispatcher),
            orchestrator,
        ));

        Ok((
            Self {
                orchestrator,
                notifier,
            },
            deliveries,
        ))
    }

    /// Wait until no round holds a task lock
    pub async fn await_idle(&self, poll_interval: Duration) {
        let locks = self.orchestrator.locks();
        if !locks.is_empty() {
            info!("Waiting for {} round(s) in progress", locks.len());
        }
        while !locks.is_empty() {
            tokio::time::sleep(poll_interval).await;
        }
    }
}
