//! Core abstractions for the orchestration model.
//!
//! - [`EffectUnit`] - Contract every animated/audible subsystem implements
//! - [`UnitFactory`] - Builds concrete units for the kinds a tier selects
//! - [`PhaseParams`] - What a unit receives when a phase starts
//! - [`PhaseRunner`] - Drives the units of one phase to satisfaction
//! - [`OrderedEventEmitter`] - Event emitter with sequence guarantees

mod events;
mod execution;
mod phase;
mod unit;

pub use events::OrderedEventEmitter;
pub use execution::{PhaseRun, PhaseRunner};
pub use phase::{PhaseOutcome, PhaseParams};
pub use unit::{EffectUnit, UnitConfig, UnitFactory, UnitKind};
