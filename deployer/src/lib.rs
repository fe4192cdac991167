//! Pagesmith deployer library
//!
//! Accepts round-based deploy requests, generates a single-file web app with
//! an LLM, publishes it to a GitHub repository served by GitHub Pages and
//! reports the outcome to the caller's evaluation endpoint.

pub mod app;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod generate;
pub mod http;
pub mod logs;
pub mod models;
pub mod notify;
pub mod repo;
pub mod server;
pub mod utils;
pub mod workers;
