//! Round orchestrator

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::deploy::locks::{TaskGuard, TaskLocks};
use crate::deploy::registry::TaskRegistry;
use crate::errors::ErrorKind;
use crate::generate::{GenerationClient, GenerationInput};
use crate::models::request::{DeployRequest, RoundMode, ValidatedRequest};
use crate::models::result::{DeploymentResult, Published};
use crate::notify::{Delivery, NotificationSink};
use crate::repo::files::{self, APP_PATH};
use crate::repo::{RepoHandle, RepositoryManager};

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Wait for the public URL to go live before reporting
    pub wait_for_pages: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            wait_for_pages: true,
        }
    }
}

/// A validated request holding its task lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct Admission {
    request: ValidatedRequest,
    _guard: TaskGuard,
}

impl Admission {
    pub fn request(&self) -> &ValidatedRequest {
        &self.request
    }
}

/// An admitted round that has not reported its result yet
struct PendingRound {
    request: ValidatedRequest,
    /// Failure kind reported if the round is abandoned now
    stage: ErrorKind,
}

/// Why a round failed
struct RoundFailure {
    kind: ErrorKind,
    message: String,
}

impl RoundFailure {
    fn generation(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::GenerationFailed,
            message: e.to_string(),
        }
    }

    fn repository(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::RepositoryOperationFailed,
            message: e.to_string(),
        }
    }
}

/// Round orchestrator
pub struct Orchestrator {
    locks: Arc<TaskLocks>,
    registry: Arc<TaskRegistry>,
    generator: GenerationClient,
    repos: RepositoryManager,
    sink: Arc<dyn NotificationSink>,
    options: OrchestratorOptions,
    pending: Mutex<HashMap<String, PendingRound>>,
}

impl Orchestrator {
    pub fn new(
        locks: Arc<TaskLocks>,
        registry: Arc<TaskRegistry>,
        generator: GenerationClient,
        repos: RepositoryManager,
        sink: Arc<dyn NotificationSink>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            locks,
            registry,
            generator,
            repos,
            sink,
            options,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn locks(&self) -> &Arc<TaskLocks> {
        &self.locks
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Validate the request and take its task lock.
    ///
    /// Rejections have no side effects and are not notified.
    pub fn admit(&self, request: &DeployRequest) -> Result<Admission, DeploymentResult> {
        let validated = request.validate().map_err(|e| {
            warn!("Rejecting invalid request for task '{}': {}", request.task, e);
            DeploymentResult::rejected(request, ErrorKind::InvalidRequest, e.to_string())
        })?;

        match self.locks.try_lock(&validated.repo_name) {
            Some(guard) => {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.insert(
                    validated.repo_name.clone(),
                    PendingRound {
                        request: validated.clone(),
                        stage: ErrorKind::GenerationFailed,
                    },
                );
                Ok(Admission {
                    request: validated,
                    _guard: guard,
                })
            }
            None => {
                warn!(
                    "Task {} is busy, rejecting round {}",
                    validated.repo_name, validated.round
                );
                Err(DeploymentResult::rejected(
                    request,
                    ErrorKind::TaskBusy,
                    format!("task {} already has a round in progress", validated.repo_name),
                ))
            }
        }
    }

    /// Run an admitted round, release its lock and queue the notification
    pub async fn execute(&self, admission: Admission) -> DeploymentResult {
        let Admission {
            request,
            _guard: guard,
        } = admission;

        let result = self.run_round(&request).await;
        let unreported = self.take_pending(&request.repo_name);
        drop(guard);

        if unreported {
            self.sink.submit(Delivery {
                evaluation_url: request.evaluation_url.to_string(),
                result: result.clone(),
            });
        } else {
            warn!(
                "Round {} for {} finished after it was reported as abandoned",
                request.round, request.repo_name
            );
        }
        result
    }

    /// `admit` followed by `execute`
    pub async fn process(&self, request: &DeployRequest) -> DeploymentResult {
        match self.admit(request) {
            Ok(admission) => self.execute(admission).await,
            Err(rejected) => rejected,
        }
    }

    /// Number of admitted rounds that have not reported yet
    pub fn pending_rounds(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.len()
    }

    /// Report every admitted round that has not finished as failed.
    ///
    /// Each result is classified by the stage the round had reached. A round
    /// reported here submits nothing when it later finishes.
    pub fn abandon_pending(&self, reason: &str) -> usize {
        let abandoned: Vec<PendingRound> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().map(|(_, round)| round).collect()
        };

        for round in &abandoned {
            let request = &round.request;
            let task = request.repo_name.as_str();
            warn!(
                "Abandoning round {} for {} during {}: {}",
                request.round, task, round.stage, reason
            );
            let known_url = self.registry.get(task).and_then(|r| r.repository_url);
            self.registry
                .fail_round(task, &format!("{}: {}", round.stage, reason));
            self.sink.submit(Delivery {
                evaluation_url: request.evaluation_url.to_string(),
                result: DeploymentResult::failed(request, round.stage, reason, known_url),
            });
        }
        abandoned.len()
    }

    /// True if the round was still unreported
    fn take_pending(&self, task: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.remove(task).is_some()
    }

    fn enter_stage(&self, task: &str, stage: ErrorKind) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(round) = pending.get_mut(task) {
            round.stage = stage;
        }
    }

    async fn run_round(&self, request: &ValidatedRequest) -> DeploymentResult {
        let task = request.repo_name.as_str();
        let record = self.registry.get(task);
        let known_url = record.as_ref().and_then(|r| r.repository_url.clone());
        let known_repo = record.and_then(|r| r.repository);

        let mode = match request.requested_mode() {
            RoundMode::Update if known_url.is_none() => {
                info!(
                    "Round {} for unknown task {}, creating on first contact",
                    request.round, task
                );
                RoundMode::Create
            }
            mode => mode,
        };

        info!("Starting round {} for {} ({:?})", request.round, task, mode);
        self.registry.begin_round(task, mode);

        match self.publish(request, mode, known_repo).await {
            Ok(published) => {
                info!(
                    "Round {} for {} published at {} ({})",
                    request.round, task, published.public_url, published.commit_sha
                );
                self.registry.complete_round(
                    task,
                    request.round,
                    &published.public_url,
                    &published.commit_sha,
                );
                DeploymentResult::success(request, published)
            }
            Err(failure) => {
                error!(
                    "Round {} for {} failed ({}): {}",
                    request.round, task, failure.kind, failure.message
                );
                self.registry
                    .fail_round(task, &format!("{}: {}", failure.kind, failure.message));
                DeploymentResult::failed(request, failure.kind, failure.message, known_url)
            }
        }
    }

    async fn publish(
        &self,
        request: &ValidatedRequest,
        mode: RoundMode,
        known_repo: Option<RepoHandle>,
    ) -> Result<Published, RoundFailure> {
        let task = request.repo_name.as_str();

        // Rounds after the first need the repository up front to read prior code
        let (mut repo, has_prior) = match (request.requested_mode(), known_repo) {
            (RoundMode::Update, Some(handle)) => (Some(handle), true),
            (RoundMode::Update, None) => {
                self.enter_stage(task, ErrorKind::RepositoryOperationFailed);
                let ensured = self
                    .repos
                    .ensure_repository(task)
                    .await
                    .map_err(RoundFailure::repository)?;
                self.registry.remember_repository(task, &ensured.handle);
                (Some(ensured.handle), !ensured.created)
            }
            (RoundMode::Create, _) => (None, false),
        };

        let prior_code = match &repo {
            Some(handle) if has_prior => self.read_prior_code(handle).await,
            _ => None,
        };

        self.enter_stage(task, ErrorKind::GenerationFailed);
        let code = self
            .generator
            .generate(GenerationInput {
                brief: &request.brief,
                checks: &request.checks,
                attachments: &request.attachments,
                prior_code: prior_code.as_deref(),
            })
            .await
            .map_err(RoundFailure::generation)?;

        let readme = self
            .generator
            .generate_readme(task, &request.brief, request.round)
            .await;

        self.enter_stage(task, ErrorKind::RepositoryOperationFailed);
        let handle = match repo.take() {
            Some(handle) => handle,
            None => {
                let ensured = self
                    .repos
                    .ensure_repository(task)
                    .await
                    .map_err(RoundFailure::repository)?;
                self.registry.remember_repository(task, &ensured.handle);
                ensured.handle
            }
        };

        let license_holder = match mode {
            RoundMode::Create => Some(handle.owner.as_str()),
            RoundMode::Update => None,
        };
        let file_set = files::round_files(code, readme, license_holder);
        let message = files::commit_message(request.round, &request.brief);

        let commit_sha = self
            .repos
            .write_files(&handle, &file_set, &message)
            .await
            .map_err(RoundFailure::repository)?;

        let public_url = self
            .repos
            .enable_hosting(&handle)
            .await
            .map_err(RoundFailure::repository)?;

        let pages_ready = if self.options.wait_for_pages {
            self.repos.await_live(&public_url).await
        } else {
            false
        };

        Ok(Published {
            public_url,
            repo_url: handle.html_url.clone(),
            commit_sha,
            pages_ready,
        })
    }

    /// Best-effort read of the published app
    async fn read_prior_code(&self, handle: &RepoHandle) -> Option<String> {
        match self.repos.read_file(handle, APP_PATH).await {
            Ok(Some(code)) => {
                debug!("Read {} bytes of prior code from {}", code.len(), handle.name);
                Some(code)
            }
            Ok(None) => {
                debug!("{} has no {} yet", handle.name, APP_PATH);
                None
            }
            Err(e) => {
                warn!("Could not read prior code from {}: {}", handle.name, e);
                None
            }
        }
    }
}
