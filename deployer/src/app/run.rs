//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions, ServerOptions};
use crate::app::state::AppState;
use crate::errors::DeployerError;
use crate::notify::{Delivery, Notifier};
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::notifier;

/// How often shutdown checks for rounds still in progress
const ROUND_DRAIN_POLL: Duration = Duration::from_millis(200);

/// Failure message for rounds cut off by shutdown
const ABANDONED_REASON: &str = "deployer shut down before the round finished";

/// Run the deployer
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployerError> {
    info!("Initializing deployer...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start deployer: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeployerError> {
    let AppOptions {
        lifecycle: _,
        server,
        secret,
        aipipe,
        generation,
        github,
        repo_retry,
        notifier,
        orchestrator,
    } = options;

    let (app_state, deliveries) =
        AppState::init(aipipe, generation, github, repo_retry, notifier, orchestrator)?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_notifier_worker(app_state.notifier.clone(), deliveries, shutdown_manager)?;

    init_socket_server(
        &server,
        app_state,
        secret,
        shutdown_manager,
        shutdown_tx.subscribe(),
    )
    .await?;

    Ok(())
}

fn init_notifier_worker(
    notifier: Arc<dyn Notifier>,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeployerError> {
    info!("Initializing notifier worker...");

    // Stopped after in-flight rounds finish, not on the broadcast
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let notifier_handle = tokio::spawn(async move {
        notifier::run(
            notifier,
            deliveries,
            Box::pin(async move {
                let _ = stop_rx.await;
            }),
        )
        .await;
    });

    shutdown_manager.with_notifier_worker(notifier_handle, stop_tx)?;
    Ok(())
}

async fn init_socket_server(
    options: &ServerOptions,
    app_state: Arc<AppState>,
    secret: SecretString,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeployerError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(app_state.orchestrator.clone(), secret);

    let server_handle = serve(options, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct NotifierWorker {
    handle: JoinHandle<()>,
    stop_tx: oneshot::Sender<()>,
}

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), DeployerError>>>,
    notifier_worker: Option<NotifierWorker>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
            notifier_worker: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), DeployerError> {
        if self.app_state.is_some() {
            return Err(DeployerError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_notifier_worker(
        &mut self,
        handle: JoinHandle<()>,
        stop_tx: oneshot::Sender<()>,
    ) -> Result<(), DeployerError> {
        if self.notifier_worker.is_some() {
            return Err(DeployerError::ShutdownError("notifier_worker already set".to_string()));
        }
        self.notifier_worker = Some(NotifierWorker { handle, stop_tx });
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DeployerError>>,
    ) -> Result<(), DeployerError> {
        if self.socket_server_handle.is_some() {
            return Err(DeployerError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    /// Stop the server, wait for accepted rounds, then drain notifications.
    ///
    /// Rounds and the notifier drain each get `max_shutdown_delay`. Rounds
    /// still running when it expires are reported as failed.
    pub async fn shutdown(&mut self) -> Result<(), DeployerError> {
        let _ = self.shutdown_tx.send(());
        info!("Shutting down deployer...");

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        let mut result = Ok(());

        // 1. Socket server stops accepting requests
        if let Some(handle) = self.socket_server_handle.take() {
            let stopped = match tokio::time::timeout(max_delay, handle).await {
                Ok(joined) => joined
                    .map_err(|e| DeployerError::ShutdownError(e.to_string()))
                    .and_then(|served| served),
                Err(_) => Err(timed_out("socket server", max_delay)),
            };
            if let Err(e) = stopped {
                error!("Socket server did not stop cleanly: {}", e);
                result = result.and(Err(e));
            }
        }

        // 2. Rounds already accepted run to completion or are abandoned
        if let Some(app_state) = self.app_state.take() {
            let idle =
                tokio::time::timeout(max_delay, app_state.await_idle(ROUND_DRAIN_POLL)).await;
            if idle.is_err() {
                let abandoned = app_state.orchestrator.abandon_pending(ABANDONED_REASON);
                error!(
                    "{} round(s) still running after {:?}, reported as failed",
                    abandoned, max_delay
                );
                result = result.and(Err(timed_out("rounds", max_delay)));
            }
        }

        // 3. Notifier worker drains its queue
        if let Some(worker) = self.notifier_worker.take() {
            let _ = worker.stop_tx.send(());
            let drained = match tokio::time::timeout(max_delay, worker.handle).await {
                Ok(joined) => joined.map_err(|e| DeployerError::ShutdownError(e.to_string())),
                Err(_) => Err(timed_out("notifier worker", max_delay)),
            };
            if let Err(e) = drained {
                error!("Notifier worker did not drain: {}", e);
                result = result.and(Err(e));
            }
        }

        if result.is_ok() {
            info!("Shutdown complete");
        }
        result
    }
}

fn timed_out(stage: &str, after: Duration) -> DeployerError {
    DeployerError::ShutdownError(format!("{} timed out after {:?}", stage, after))
}
