//! Inbound HTTP gateway

pub mod handlers;
pub mod serve;
pub mod state;
