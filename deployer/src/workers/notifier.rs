//! Notifier worker: delivers queued deployment results

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::notify::{deliver_logged, Delivery, Notifier};

/// Run the notifier worker.
///
/// Deliveries run concurrently. On shutdown the queue is closed, anything
/// already queued is still delivered and in-flight deliveries are awaited.
pub async fn run(
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Notifier worker starting...");

    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Notifier worker shutting down...");
                break;
            }
            delivery = rx.recv() => {
                match delivery {
                    Some(delivery) => {
                        let notifier = notifier.clone();
                        in_flight.spawn(async move { deliver_logged(&notifier, delivery).await });
                    }
                    None => {
                        debug!("Notification queue closed");
                        break;
                    }
                }
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    error!("Notification task failed: {}", e);
                }
            }
        }
    }

    rx.close();
    while let Some(delivery) = rx.recv().await {
        let notifier = notifier.clone();
        in_flight.spawn(async move { deliver_logged(&notifier, delivery).await });
    }

    if !in_flight.is_empty() {
        info!("Waiting for {} notification(s) to finish", in_flight.len());
    }
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Notification task failed: {}", e);
        }
    }

    info!("Notifier worker stopped");
}
