//! Repository manager tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use deployer::repo::{
    EnsuredRepo, RepoError, RepoFile, RepoHandle, RepositoryHost, RepositoryManager, RetryOptions,
};

use crate::support::{fast_retry, FakeHost};

#[tokio::test]
async fn test_ensure_twice_creates_once() {
    let host = Arc::new(FakeHost::new());
    let manager = RepositoryManager::new(host.clone(), fast_retry());

    let first = assert_ok!(manager.ensure_repository("calculator").await);
    let second = assert_ok!(manager.ensure_repository("calculator").await);

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.handle, second.handle);
    assert_eq!(FakeHost::count(&host.creations), 1);
}

#[tokio::test]
async fn test_transient_errors_exhaust_attempts() {
    let host = Arc::new(FakeHost::new());
    host.fail_next_ensures(5);
    let manager = RepositoryManager::new(host.clone(), fast_retry());

    let err = assert_err!(manager.ensure_repository("calculator").await);
    assert!(err.is_transient());
    assert_eq!(FakeHost::count(&host.ensure_calls), 3);
}

#[tokio::test]
async fn test_rejections_are_not_retried() {
    let host = Arc::new(FakeHost::new());
    host.set_fail_hosting(true);
    let manager = RepositoryManager::new(host.clone(), fast_retry());

    let ensured = assert_ok!(manager.ensure_repository("calculator").await);
    let err = assert_err!(manager.enable_hosting(&ensured.handle).await);

    assert!(matches!(err, RepoError::Rejected { status: 403, .. }));
    assert_eq!(FakeHost::count(&host.hosting_calls), 1);
}

#[tokio::test]
async fn test_write_then_read_round_trip_through_manager() {
    let host = Arc::new(FakeHost::new());
    let manager = RepositoryManager::new(host.clone(), fast_retry());
    let ensured = assert_ok!(manager.ensure_repository("calculator").await);

    let sha = assert_ok!(
        manager
            .write_files(
                &ensured.handle,
                &[RepoFile::new("index.html", "<html>calc</html>")],
                "Round 1: basic calculator",
            )
            .await
    );
    assert_eq!(sha, "commit1");

    let read = assert_ok!(manager.read_file(&ensured.handle, "index.html").await);
    assert_eq!(read.as_deref(), Some("<html>calc</html>"));
    let missing = assert_ok!(manager.read_file(&ensured.handle, "app.js").await);
    assert!(missing.is_none());
}

/// Host whose calls never finish in time
struct StuckHost {
    calls: AtomicUsize,
}

#[async_trait]
impl RepositoryHost for StuckHost {
    async fn ensure_repository(&self, _name: &str) -> Result<EnsuredRepo, RepoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        Err(RepoError::Invalid("unreachable".to_string()))
    }

    async fn write_files(
        &self,
        _repo: &RepoHandle,
        _files: &[RepoFile],
        _message: &str,
    ) -> Result<String, RepoError> {
        Err(RepoError::Invalid("unused".to_string()))
    }

    async fn enable_hosting(&self, _repo: &RepoHandle) -> Result<String, RepoError> {
        Err(RepoError::Invalid("unused".to_string()))
    }

    async fn read_file(&self, _repo: &RepoHandle, _path: &str) -> Result<Option<String>, RepoError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_call_timeout_is_transient_and_retried() {
    let host = Arc::new(StuckHost {
        calls: AtomicUsize::new(0),
    });
    let manager = RepositoryManager::new(
        host.clone(),
        RetryOptions {
            max_attempts: 2,
            call_timeout: Duration::from_millis(20),
            ..fast_retry()
        },
    );

    let err = assert_err!(manager.ensure_repository("calculator").await);
    assert!(matches!(err, RepoError::Timeout { .. }));
    assert_eq!(host.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_await_live_defaults_to_ready() {
    let host = Arc::new(FakeHost::new());
    let manager = RepositoryManager::new(host, fast_retry());
    assert!(manager.await_live("https://octocat.github.io/calculator/").await);
}
