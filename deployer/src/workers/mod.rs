//! Background workers

pub mod notifier;
