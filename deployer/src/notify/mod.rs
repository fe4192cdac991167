//! Notification sender
//!
//! Results are handed to a [`NotificationSink`] without waiting. The
//! [`NotificationDispatcher`] queues them for the notifier worker, which
//! delivers each one through a [`Notifier`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use openapi_client::models::EvaluationNotification;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::errors::DeployerError;
use crate::http::client::{ClientOptions, HttpClient};
use crate::models::result::DeploymentResult;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// A result waiting to be delivered
#[derive(Debug, Clone)]
pub struct Delivery {
    pub evaluation_url: String,
    pub result: DeploymentResult,
}

/// Delivers one notification, retrying as it sees fit
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the number of attempts made
    async fn deliver(
        &self,
        evaluation_url: &str,
        payload: &EvaluationNotification,
    ) -> Result<u32, DeployerError>;
}

/// Accepts results for asynchronous delivery
pub trait NotificationSink: Send + Sync {
    fn submit(&self, delivery: Delivery);
}

/// Notifier options
#[derive(Debug, Clone)]
pub struct NotifierOptions {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Per-attempt HTTP timeout
    pub timeout: Duration,

    pub cooldown: CooldownOptions,
}

impl Default for NotifierOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            cooldown: CooldownOptions::default(),
        }
    }
}

/// POSTs notifications as JSON
pub struct HttpNotifier {
    http: HttpClient,
    options: NotifierOptions,
}

impl HttpNotifier {
    pub fn new(options: NotifierOptions) -> Result<Self, DeployerError> {
        // Evaluation URLs are absolute, so no base URL
        let http = HttpClient::new(ClientOptions {
            timeout: options.timeout,
            ..Default::default()
        })?;
        Ok(Self { http, options })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn deliver(
        &self,
        evaluation_url: &str,
        payload: &EvaluationNotification,
    ) -> Result<u32, DeployerError> {
        let max_attempts = self.options.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.http.post_unit(evaluation_url, payload).await {
                Ok(()) => {
                    debug!(
                        "Notified {} for {} round {} (attempt {})",
                        evaluation_url, payload.task, payload.round, attempt
                    );
                    return Ok(attempt);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = calc_exp_backoff(&self.options.cooldown, attempt - 1);
                    warn!(
                        "Notification to {} failed (attempt {}/{}), retrying in {:?}: {}",
                        evaluation_url, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(DeployerError::NotificationDeliveryFailed {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Queues deliveries for the notifier worker
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl NotificationDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for NotificationDispatcher {
    fn submit(&self, delivery: Delivery) {
        let task = delivery.result.task.clone();
        if self.tx.send(delivery).is_err() {
            error!("Notifier worker is gone, dropping notification for {}", task);
        }
    }
}

/// Deliver a queued result, logging the outcome
pub async fn deliver_logged(notifier: &Arc<dyn Notifier>, delivery: Delivery) {
    let payload = delivery.result.to_notification();
    match notifier.deliver(&delivery.evaluation_url, &payload).await {
        Ok(attempts) => debug!(
            "Delivered {} round {} result in {} attempt(s)",
            payload.task, payload.round, attempts
        ),
        Err(e) => error!(
            "Could not deliver {} round {} result to {}: {}",
            payload.task, payload.round, delivery.evaluation_url, e
        ),
    }
}
