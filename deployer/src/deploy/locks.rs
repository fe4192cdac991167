//! Per-task lock table

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Process-wide set of tasks with a round in flight.
///
/// Non-blocking and non-reentrant: a second acquire for the same task fails
/// until the first is released, even from the same caller.
#[derive(Debug, Default)]
pub struct TaskLocks {
    held: Mutex<HashSet<String>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock; false if it is already held
    pub fn try_acquire(&self, task: &str) -> bool {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.insert(task.to_string())
    }

    /// Release the lock. Releasing a free lock is a no-op.
    pub fn release(&self, task: &str) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.remove(task) {
            debug!("Released lock for {} that was not held", task);
        }
    }

    pub fn is_held(&self, task: &str) -> bool {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.contains(task)
    }

    /// Number of tasks currently locked
    pub fn len(&self) -> usize {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the lock as a guard that releases it on drop
    pub fn try_lock(self: &Arc<Self>, task: &str) -> Option<TaskGuard> {
        if self.try_acquire(task) {
            Some(TaskGuard {
                locks: Arc::clone(self),
                task: task.to_string(),
            })
        } else {
            None
        }
    }
}

/// Held task lock
#[derive(Debug)]
pub struct TaskGuard {
    locks: Arc<TaskLocks>,
    task: String,
}

impl TaskGuard {
    pub fn task(&self) -> &str {
        &self.task
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.locks.release(&self.task);
    }
}
