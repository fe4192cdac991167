//! Orchestrator tests

use std::sync::Arc;

use tokio::sync::Notify;

use deployer::errors::ErrorKind;
use deployer::generate::GenerationError;
use deployer::models::result::DeploymentStatus;
use deployer::repo::files::{APP_PATH, LICENSE_PATH, README_PATH};

use crate::support::{harness, html, request, FakeBackend, FakeHost};

#[tokio::test]
async fn test_fresh_round_one_publishes() {
    let h = harness(FakeBackend::html("captcha solver"));

    let result = h.orchestrator.process(&request("Captcha Solver", 1, "solve captchas")).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(
        result.repository_url.as_deref(),
        Some("https://octocat.github.io/captcha-solver/")
    );
    assert_eq!(result.repo_url.as_deref(), Some("https://github.com/octocat/captcha-solver"));
    assert_eq!(result.commit_sha.as_deref(), Some("commit1"));
    assert_eq!(result.task, "Captcha Solver");
    assert_eq!(result.checks, vec!["document.title.length > 0".to_string()]);

    let record = h.orchestrator.registry().get("captcha-solver").unwrap();
    assert_eq!(record.last_round, 1);
    assert_eq!(record.repository_url, result.repository_url);
    assert_eq!(record.fsm.label(), "succeeded");

    assert_eq!(h.host.file("captcha-solver", APP_PATH), Some(html("captcha solver")));
    assert!(h.host.file("captcha-solver", README_PATH).is_some());
    assert!(h.host.file("captcha-solver", LICENSE_PATH).unwrap().contains("MIT License"));

    assert!(!h.orchestrator.locks().is_held("captcha-solver"));

    let deliveries = h.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].evaluation_url, "https://evaluator.example.com/notify");
    assert_eq!(deliveries[0].result.status, DeploymentStatus::Success);
}

#[tokio::test]
async fn test_calculator_round_two_revises_prior_code() {
    let h = harness(FakeBackend::html("calculator"));

    let first = h.orchestrator.process(&request("calculator", 1, "basic calculator")).await;
    assert!(first.is_success());

    h.backend.set_reply(Ok(html("calculator with history")));
    let second = h.orchestrator.process(&request("calculator", 2, "add history")).await;
    assert!(second.is_success(), "{:?}", second.error);
    assert_eq!(second.repository_url, first.repository_url);
    assert_eq!(second.round, 2);

    // The update prompt carries the round 1 app
    let prompts = h.backend.app_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("CURRENT VERSION"));
    assert!(prompts[1].contains(&html("calculator")));
    assert!(prompts[1].contains("add history"));

    assert_eq!(FakeHost::count(&h.host.creations), 1);
    assert_eq!(
        h.host.file("calculator", APP_PATH),
        Some(html("calculator with history"))
    );

    let record = h.orchestrator.registry().get("calculator").unwrap();
    assert_eq!(record.last_round, 2);
    assert_eq!(h.sink.deliveries().len(), 2);
}

#[tokio::test]
async fn test_busy_task_is_rejected_without_side_effects() {
    let h = harness(FakeBackend::html("app"));
    assert!(h.orchestrator.locks().try_acquire("calculator"));

    let result = h.orchestrator.process(&request("calculator", 1, "basic calculator")).await;

    assert_eq!(result.status, DeploymentStatus::Failure);
    assert_eq!(result.error_kind(), Some(ErrorKind::TaskBusy));
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.host.total_calls(), 0);
    assert!(h.sink.deliveries().is_empty());

    // Still held by the first owner
    assert!(h.orchestrator.locks().is_held("calculator"));
    h.orchestrator.locks().release("calculator");

    let result = h.orchestrator.process(&request("calculator", 1, "basic calculator")).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_invalid_requests_touch_nothing() {
    let h = harness(FakeBackend::html("app"));

    let round_zero = h.orchestrator.process(&request("calculator", 0, "basic calculator")).await;
    assert_eq!(round_zero.error_kind(), Some(ErrorKind::InvalidRequest));

    let mut no_callback = request("calculator", 1, "basic calculator");
    no_callback.evaluation_url = String::new();
    let no_callback = h.orchestrator.process(&no_callback).await;
    assert_eq!(no_callback.error_kind(), Some(ErrorKind::InvalidRequest));

    let blank_task = h.orchestrator.process(&request("???", 1, "basic calculator")).await;
    assert_eq!(blank_task.error_kind(), Some(ErrorKind::InvalidRequest));

    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.host.total_calls(), 0);
    assert!(h.sink.deliveries().is_empty());
    assert!(h.orchestrator.locks().is_empty());
    assert!(h.orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_empty_output_fails_without_writes() {
    let h = harness(FakeBackend::replying(Ok("I cannot help with that.".to_string())));

    let result = h.orchestrator.process(&request("calculator", 1, "basic calculator")).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::GenerationFailed));
    assert!(result.repository_url.is_none());
    assert_eq!(FakeHost::count(&h.host.write_calls), 0);
    assert_eq!(FakeHost::count(&h.host.creations), 0);
    assert!(!h.orchestrator.locks().is_held("calculator"));

    let record = h.orchestrator.registry().get("calculator").unwrap();
    assert_eq!(record.fsm.label(), "failed");
    assert!(record.last_error.is_some());
    assert_eq!(record.last_round, 0);

    let deliveries = h.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].result.error_kind(), Some(ErrorKind::GenerationFailed));
}

#[tokio::test]
async fn test_failed_update_keeps_known_url() {
    let h = harness(FakeBackend::html("calculator"));
    let first = h.orchestrator.process(&request("calculator", 1, "basic calculator")).await;
    assert!(first.is_success());

    h.backend.set_reply(Err(GenerationError::RateLimited("slow down".to_string())));
    let second = h.orchestrator.process(&request("calculator", 2, "add history")).await;

    assert_eq!(second.error_kind(), Some(ErrorKind::GenerationFailed));
    assert_eq!(second.repository_url, first.repository_url);

    let record = h.orchestrator.registry().get("calculator").unwrap();
    assert_eq!(record.repository_url, first.repository_url);
    assert_eq!(record.last_round, 1);
    assert!(record.last_error.unwrap().contains("slow down"));
}

#[tokio::test]
async fn test_update_for_unknown_task_creates_on_first_contact() {
    let h = harness(FakeBackend::html("markdown viewer v3"));
    // Repository survived a restart of the deployer
    h.host.seed("markdown-viewer", APP_PATH, &html("markdown viewer v2"));

    let result = h.orchestrator.process(&request("markdown-viewer", 3, "add dark mode")).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(FakeHost::count(&h.host.creations), 0);
    assert!(h.backend.app_prompts()[0].contains(&html("markdown viewer v2")));
    assert_eq!(h.orchestrator.registry().get("markdown-viewer").unwrap().last_round, 3);
}

#[tokio::test]
async fn test_hosting_failure_is_healed_by_next_round() {
    let h = harness(FakeBackend::html("sales summary"));
    h.host.set_fail_hosting(true);

    let first = h.orchestrator.process(&request("sales", 1, "sum the sales")).await;
    assert_eq!(first.error_kind(), Some(ErrorKind::RepositoryOperationFailed));
    assert!(first.error.as_ref().unwrap().message.contains("Pages is disabled"));
    assert!(first.repository_url.is_none());
    // Not retried: the provider rejected the call
    assert_eq!(FakeHost::count(&h.host.hosting_calls), 1);

    h.host.set_fail_hosting(false);
    let second = h.orchestrator.process(&request("sales", 2, "add a chart")).await;

    assert!(second.is_success(), "{:?}", second.error);
    assert_eq!(FakeHost::count(&h.host.creations), 1);
    assert!(h.backend.app_prompts()[1].contains(&html("sales summary")));
}

#[tokio::test]
async fn test_transient_repository_errors_are_retried() {
    let h = harness(FakeBackend::html("app"));
    h.host.fail_next_ensures(2);

    let result = h.orchestrator.process(&request("retry-me", 1, "basic page")).await;

    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(FakeHost::count(&h.host.ensure_calls), 3);
}

#[tokio::test]
async fn test_different_tasks_run_concurrently() {
    let h = harness(FakeBackend::html("app"));

    let first = request("task-a", 1, "first app");
    let second = request("task-b", 1, "second app");
    let (a, b) = tokio::join!(
        h.orchestrator.process(&first),
        h.orchestrator.process(&second),
    );

    assert!(a.is_success());
    assert!(b.is_success());
    assert_eq!(h.orchestrator.registry().len(), 2);
    assert!(h.orchestrator.locks().is_empty());
}

#[tokio::test]
async fn test_admission_holds_lock_until_dropped() {
    let h = harness(FakeBackend::html("app"));

    let admission = h
        .orchestrator
        .admit(&request("calculator", 1, "basic calculator"))
        .unwrap();
    assert_eq!(admission.request().repo_name, "calculator");

    let busy = h.orchestrator.admit(&request("calculator", 2, "add history"));
    assert_eq!(busy.unwrap_err().error_kind(), Some(ErrorKind::TaskBusy));

    drop(admission);
    assert!(!h.orchestrator.locks().is_held("calculator"));
    assert!(h.sink.deliveries().is_empty());
}

#[tokio::test]
async fn test_abandoned_round_is_reported_once() {
    let h = harness(FakeBackend::html("app"));
    let gate = Arc::new(Notify::new());
    h.backend.hold_until(gate.clone());

    let admission = h.orchestrator.admit(&request("slow-app", 1, "slow page")).unwrap();
    assert_eq!(h.orchestrator.pending_rounds(), 1);
    let orchestrator = h.orchestrator.clone();
    let round = tokio::spawn(async move { orchestrator.execute(admission).await });
    assert_eq!(h.backend.wait_for_calls(1).await, 1);

    let abandoned = h.orchestrator.abandon_pending("deployer shut down");
    assert_eq!(abandoned, 1);
    assert_eq!(h.orchestrator.pending_rounds(), 0);

    let deliveries = h.sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let reported = &deliveries[0].result;
    assert_eq!(reported.status, DeploymentStatus::Failure);
    assert_eq!(reported.error_kind(), Some(ErrorKind::GenerationFailed));
    assert_eq!(reported.error.as_ref().unwrap().message, "deployer shut down");
    assert_eq!(reported.nonce, "nonce-1");
    assert_eq!(
        h.orchestrator.registry().get("slow-app").unwrap().fsm.label(),
        "failed"
    );

    // The round finishing later does not notify a second time
    gate.notify_one();
    let finished = round.await.unwrap();
    assert!(finished.is_success(), "{:?}", finished.error);
    assert_eq!(h.sink.deliveries().len(), 1);
    assert!(h.orchestrator.locks().is_empty());
}

#[tokio::test]
async fn test_finished_rounds_leave_nothing_to_abandon() {
    let h = harness(FakeBackend::html("app"));

    let result = h.orchestrator.process(&request("quick-app", 1, "quick page")).await;
    assert!(result.is_success());

    assert_eq!(h.orchestrator.pending_rounds(), 0);
    assert_eq!(h.orchestrator.abandon_pending("deployer shut down"), 0);
    assert_eq!(h.sink.deliveries().len(), 1);
}
