//! Notification sender tests against a real local HTTP endpoint

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use openapi_client::models::EvaluationNotification;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use deployer::errors::{DeployerError, ErrorKind};
use deployer::models::result::DeploymentResult;
use deployer::notify::{
    Delivery, HttpNotifier, NotificationDispatcher, NotificationSink, Notifier, NotifierOptions,
};
use deployer::utils::CooldownOptions;
use deployer::workers::notifier;

use crate::support::request;

/// Fake evaluation endpoint answering `fail_first` times with `fail_status`
#[derive(Clone)]
struct Endpoint {
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
    fail_first: usize,
    fail_status: StatusCode,
}

async fn record(State(endpoint): State<Endpoint>, Json(body): Json<Value>) -> StatusCode {
    let hit = endpoint.hits.fetch_add(1, Ordering::SeqCst);
    endpoint.bodies.lock().unwrap().push(body);
    if hit < endpoint.fail_first {
        endpoint.fail_status
    } else {
        StatusCode::OK
    }
}

async fn start_endpoint(fail_first: usize, fail_status: StatusCode) -> (Endpoint, String) {
    let endpoint = Endpoint {
        hits: Arc::new(AtomicUsize::new(0)),
        bodies: Arc::new(Mutex::new(Vec::new())),
        fail_first,
        fail_status,
    };
    let app = Router::new()
        .route("/notify", post(record))
        .with_state(endpoint.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (endpoint, format!("http://{}/notify", addr))
}

fn notifier(max_retries: u32) -> HttpNotifier {
    HttpNotifier::new(NotifierOptions {
        max_retries,
        timeout: Duration::from_secs(5),
        cooldown: CooldownOptions {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        },
    })
    .unwrap()
}

fn payload() -> EvaluationNotification {
    let result = DeploymentResult::rejected(
        &request("calculator", 1, "basic calculator"),
        ErrorKind::GenerationFailed,
        "timed out",
    );
    result.to_notification()
}

#[tokio::test]
async fn test_retries_server_errors_until_delivered() {
    let (endpoint, url) = start_endpoint(2, StatusCode::SERVICE_UNAVAILABLE).await;

    let attempts = notifier(3).deliver(&url, &payload()).await.unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 3);
    let bodies = endpoint.bodies.lock().unwrap();
    assert_eq!(bodies[2]["task"], "calculator");
    assert_eq!(bodies[2]["status"], "failure");
    assert_eq!(bodies[2]["error"]["kind"], "GenerationFailed");
    assert_eq!(bodies[2]["pages_ready"], false);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (endpoint, url) = start_endpoint(usize::MAX, StatusCode::BAD_REQUEST).await;

    let err = notifier(3).deliver(&url, &payload()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployerError::NotificationDeliveryFailed { attempts: 1, .. }
    ));
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unbounded_retry_setting_does_not_overflow() {
    let (endpoint, url) = start_endpoint(usize::MAX, StatusCode::NOT_FOUND).await;

    let err = notifier(u32::MAX).deliver(&url, &payload()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployerError::NotificationDeliveryFailed { attempts: 1, .. }
    ));
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let (endpoint, url) = start_endpoint(usize::MAX, StatusCode::INTERNAL_SERVER_ERROR).await;

    let err = notifier(2).deliver(&url, &payload()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployerError::NotificationDeliveryFailed { attempts: 3, .. }
    ));
    assert_eq!(endpoint.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_connection_errors_are_retried() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = notifier(1)
        .deliver(&format!("http://{}/notify", addr), &payload())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployerError::NotificationDeliveryFailed { attempts: 2, .. }
    ));
}

/// Notifier that only records what it was asked to deliver
#[derive(Default)]
struct CountingNotifier {
    delivered: Mutex<Vec<(String, u32)>>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn deliver(
        &self,
        evaluation_url: &str,
        payload: &EvaluationNotification,
    ) -> Result<u32, DeployerError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.delivered
            .lock()
            .unwrap()
            .push((evaluation_url.to_string(), payload.round));
        Ok(1)
    }
}

#[tokio::test]
async fn test_worker_drains_queue_on_shutdown() {
    let counting = Arc::new(CountingNotifier::default());
    let (dispatcher, deliveries) = NotificationDispatcher::new();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let worker = tokio::spawn(notifier::run(
        counting.clone(),
        deliveries,
        Box::pin(async move {
            let _ = stop_rx.await;
        }),
    ));

    for round in 1..=3 {
        dispatcher.submit(Delivery {
            evaluation_url: "https://evaluator.example.com/notify".to_string(),
            result: DeploymentResult::rejected(
                &request("calculator", round, "brief"),
                ErrorKind::GenerationFailed,
                "boom",
            ),
        });
    }
    stop_tx.send(()).unwrap();
    worker.await.unwrap();

    let mut rounds: Vec<u32> = counting
        .delivered
        .lock()
        .unwrap()
        .iter()
        .map(|(_, round)| *round)
        .collect();
    rounds.sort();
    assert_eq!(rounds, vec![1, 2, 3]);
}
