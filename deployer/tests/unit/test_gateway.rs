//! Gateway tests driving the router directly

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use deployer::models::result::DeploymentStatus;
use deployer::server::serve::router;
use deployer::server::state::ServerState;

use crate::support::{harness, FakeBackend, FakeHost, Harness};

const SECRET: &str = "s3cret";

fn app(h: &Harness) -> Router {
    let state = ServerState::new(h.orchestrator.clone(), SecretString::from(SECRET));
    router(Arc::new(state))
}

fn deploy_body(task: &str, round: i64) -> Value {
    json!({
        "secret": SECRET,
        "round": round,
        "email": "student@example.com",
        "task": task,
        "brief": "basic calculator",
        "checks": ["document.querySelector('#result')"],
        "attachments": [{"name": "sample.csv", "url": "data:text/csv;base64,YSxi"}],
        "evaluation_url": "https://evaluator.example.com/notify",
        "nonce": "ab12-cd34"
    })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn post_deploy(app: Router, body: Value) -> (StatusCode, Value) {
    send(app, "POST", "/api/deploy", Some(body.to_string())).await
}

#[tokio::test]
async fn test_health() {
    let h = harness(FakeBackend::html("app"));
    let (status, body) = send(app(&h), "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["supported_rounds"]["create"].is_string());
}

#[tokio::test]
async fn test_version() {
    let h = harness(FakeBackend::html("app"));
    let (status, body) = send(app(&h), "GET", "/version", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_bad_secret_is_unauthorized() {
    let h = harness(FakeBackend::html("app"));

    let mut body = deploy_body("calculator", 1);
    body["secret"] = json!("wrong");
    let (status, json) = post_deploy(app(&h), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Unauthorized");

    let mut body = deploy_body("calculator", 1);
    body.as_object_mut().unwrap().remove("secret");
    let (status, _) = post_deploy(app(&h), body).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_and_invalid_requests() {
    let h = harness(FakeBackend::html("app"));

    let (status, json) = send(
        app(&h),
        "POST",
        "/api/deploy",
        Some("{not json".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "InvalidRequest");

    let mut body = deploy_body("calculator", 1);
    body["round"] = json!("one");
    let (status, _) = post_deploy(app(&h), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = post_deploy(app(&h), deploy_body("calculator", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "InvalidRequest");

    let mut body = deploy_body("calculator", 1);
    body["evaluation_url"] = json!("not a url");
    let (status, _) = post_deploy(app(&h), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.host.total_calls(), 0);
    assert!(h.sink.deliveries().is_empty());
}

#[tokio::test]
async fn test_accepted_round_is_notified() {
    let h = harness(FakeBackend::html("calculator"));

    let (status, json) = post_deploy(app(&h), deploy_body("calculator", 1)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["task"], "calculator");
    assert_eq!(json["round"], 1);
    assert_eq!(json["nonce"], "ab12-cd34");
    assert!(json["deployment_id"].is_string());

    let deliveries = h.sink.wait_for(1).await;
    assert_eq!(deliveries.len(), 1);
    let result = &deliveries[0].result;
    assert_eq!(result.status, DeploymentStatus::Success);
    assert_eq!(result.nonce, "ab12-cd34");
    assert_eq!(FakeHost::count(&h.host.creations), 1);
}

#[tokio::test]
async fn test_busy_task_conflicts() {
    let h = harness(FakeBackend::html("calculator"));
    assert!(h.orchestrator.locks().try_acquire("calculator"));

    let (status, json) = post_deploy(app(&h), deploy_body("calculator", 2)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "TaskBusy");
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn test_tasks_listing() {
    let h = harness(FakeBackend::html("calculator"));

    let (status, json) = send(app(&h), "GET", "/api/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);

    let (status, _) = post_deploy(app(&h), deploy_body("Calculator App", 1)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    h.sink.wait_for(1).await;

    let (_, json) = send(app(&h), "GET", "/api/tasks", None).await;
    assert_eq!(json["total"], 1);
    let task = &json["tasks"][0];
    assert_eq!(task["task"], "calculator-app");
    assert_eq!(task["last_round"], 1);
    assert_eq!(task["state"], "succeeded");
    assert_eq!(task["repository_url"], "https://octocat.github.io/calculator-app/");
}
