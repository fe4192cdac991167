//! Domain models

pub mod request;
pub mod result;
