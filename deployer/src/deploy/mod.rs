//! Round orchestration

pub mod fsm;
pub mod locks;
pub mod orchestrator;
pub mod registry;
