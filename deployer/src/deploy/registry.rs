//! In-memory task records

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::deploy::fsm::{RoundEvent, RoundFsm};
use crate::models::request::RoundMode;
use crate::repo::RepoHandle;

/// What the deployer knows about one task
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Repository, once it is known to exist
    pub repository: Option<RepoHandle>,
    /// Public hosting URL, set by the first successful round
    pub repository_url: Option<String>,
    /// Highest round successfully processed
    pub last_round: u32,
    pub commit_sha: Option<String>,
    pub fsm: RoundFsm,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    fn new() -> Self {
        Self {
            repository: None,
            repository_url: None,
            last_round: 0,
            commit_sha: None,
            fsm: RoundFsm::new(),
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Task records keyed by sanitized task name. Not persisted.
#[derive(Default)]
pub struct TaskRegistry {
    entries: RwLock<HashMap<String, TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task: &str) -> Option<TaskRecord> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(task).cloned()
    }

    /// Start a round, creating the record on first contact
    pub fn begin_round(&self, task: &str, mode: RoundMode) {
        self.update(task, |record| {
            if let Err(e) = record.fsm.process(RoundEvent::Begin(mode)) {
                warn!("Task {} did not settle its previous round ({}), resetting", task, e);
                let _ = record.fsm.process(RoundEvent::Reset);
                let _ = record.fsm.process(RoundEvent::Begin(mode));
            }
        });
    }

    /// Remember a repository as soon as it exists, so a later round can heal
    /// a partially created deployment
    pub fn remember_repository(&self, task: &str, handle: &RepoHandle) {
        self.update(task, |record| {
            record.repository = Some(handle.clone());
        });
    }

    pub fn complete_round(&self, task: &str, round: u32, public_url: &str, commit_sha: &str) {
        self.update(task, |record| {
            record.repository_url = Some(public_url.to_string());
            record.commit_sha = Some(commit_sha.to_string());
            record.last_round = record.last_round.max(round);
            record.last_error = None;
            finish(task, &mut record.fsm, RoundEvent::Succeed);
        });
    }

    /// Record a failed round; a known repository URL is kept
    pub fn fail_round(&self, task: &str, error: &str) {
        self.update(task, |record| {
            record.last_error = Some(error.to_string());
            finish(task, &mut record.fsm, RoundEvent::Fail(error.to_string()));
        });
    }

    /// All records, sorted by task name
    pub fn list(&self) -> Vec<(String, TaskRecord)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = entries
            .iter()
            .map(|(task, record)| (task.clone(), record.clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        records
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, task: &str, f: impl FnOnce(&mut TaskRecord)) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let record = entries.entry(task.to_string()).or_insert_with(TaskRecord::new);
        f(record);
        record.updated_at = Utc::now();
    }
}

fn finish(task: &str, fsm: &mut RoundFsm, event: RoundEvent) {
    if let Err(e) = fsm.process(event).and_then(|_| fsm.process(RoundEvent::Settle)) {
        warn!("Task {}: {}", task, e);
    }
}
