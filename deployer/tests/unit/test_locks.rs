//! Task lock table tests

use std::sync::Arc;

use deployer::deploy::locks::TaskLocks;

#[test]
fn test_acquire_is_exclusive_and_not_reentrant() {
    let locks = TaskLocks::new();

    assert!(locks.try_acquire("calculator"));
    assert!(!locks.try_acquire("calculator"));
    assert!(locks.try_acquire("markdown-viewer"));
    assert_eq!(locks.len(), 2);

    locks.release("calculator");
    assert!(!locks.is_held("calculator"));
    assert!(locks.try_acquire("calculator"));
}

#[test]
fn test_release_of_free_lock_is_noop() {
    let locks = TaskLocks::new();
    locks.release("never-held");
    assert!(locks.is_empty());
}

#[test]
fn test_guard_releases_on_drop() {
    let locks = Arc::new(TaskLocks::new());

    let guard = locks.try_lock("calculator").unwrap();
    assert_eq!(guard.task(), "calculator");
    assert!(locks.try_lock("calculator").is_none());

    drop(guard);
    assert!(!locks.is_held("calculator"));
    assert!(locks.try_lock("calculator").is_some());
}

#[test]
fn test_guard_released_on_panic() {
    let locks = Arc::new(TaskLocks::new());
    let cloned = locks.clone();

    let outcome = std::thread::spawn(move || {
        let _guard = cloned.try_lock("calculator").unwrap();
        panic!("round blew up");
    })
    .join();

    assert!(outcome.is_err());
    assert!(!locks.is_held("calculator"));
}

#[tokio::test]
async fn test_concurrent_acquire_has_one_winner() {
    let locks = Arc::new(TaskLocks::new());

    let attempts: Vec<_> = (0..16)
        .map(|_| {
            let locks = locks.clone();
            tokio::spawn(async move { locks.try_acquire("calculator") })
        })
        .collect();

    let mut winners = 0;
    for attempt in attempts {
        if attempt.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
