//! Event system for the summoning engine
//!
//! This crate provides the event bus and event types used to observe
//! sequence progress from outside the orchestrator.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
