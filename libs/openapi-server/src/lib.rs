//! Inbound HTTP API models

pub mod models;
