//! Finite State Machine for a task's rounds

use serde::{Deserialize, Serialize};

use crate::models::request::RoundMode;

/// Round state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    /// No round in flight
    Idle,

    /// Creating the repository and first app
    Creating,

    /// Revising an existing app
    Updating,

    /// Round published
    Succeeded,

    /// Round failed
    Failed,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Idle => "idle",
            RoundState::Creating => "creating",
            RoundState::Updating => "updating",
            RoundState::Succeeded => "succeeded",
            RoundState::Failed => "failed",
        }
    }
}

/// Round event
#[derive(Debug, Clone)]
pub enum RoundEvent {
    /// Lock acquired, round starts
    Begin(RoundMode),

    /// Round published
    Succeed,

    /// Round failed
    Fail(String),

    /// Lock released
    Settle,

    /// Recover from a round that never settled
    Reset,
}

/// Round FSM
#[derive(Debug, Clone)]
pub struct RoundFsm {
    state: RoundState,
    last_outcome: Option<RoundState>,
    error: Option<String>,
}

impl RoundFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: RoundState::Idle,
            last_outcome: None,
            error: None,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Outcome of the most recent finished round
    pub fn last_outcome(&self) -> Option<RoundState> {
        self.last_outcome
    }

    /// Error of the most recent failed round
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Current state, or the last outcome when idle
    pub fn label(&self) -> &'static str {
        match (self.state, self.last_outcome) {
            (RoundState::Idle, Some(outcome)) => outcome.as_str(),
            (state, _) => state.as_str(),
        }
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RoundEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // From Idle
            (RoundState::Idle, RoundEvent::Begin(RoundMode::Create)) => RoundState::Creating,
            (RoundState::Idle, RoundEvent::Begin(RoundMode::Update)) => RoundState::Updating,

            // From Creating / Updating
            (RoundState::Creating | RoundState::Updating, RoundEvent::Succeed) => {
                self.error = None;
                RoundState::Succeeded
            }
            (RoundState::Creating | RoundState::Updating, RoundEvent::Fail(err)) => {
                self.error = Some(err.clone());
                RoundState::Failed
            }

            // From Succeeded / Failed
            (RoundState::Succeeded | RoundState::Failed, RoundEvent::Settle) => {
                self.last_outcome = Some(self.state);
                RoundState::Idle
            }

            (_, RoundEvent::Reset) => RoundState::Idle,

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for RoundFsm {
    fn default() -> Self {
        Self::new()
    }
}
