//! Server state

use std::sync::Arc;

use secrecy::SecretString;

use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    /// Shared secret callers must present
    pub secret: SecretString,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, secret: SecretString) -> Self {
        Self {
            orchestrator,
            secret,
        }
    }
}
