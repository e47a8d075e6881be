//! RAII resource guards for automatic cleanup.
//!
//! - [`UnitSet`] - Disposes every prepared effect unit exactly once
//! - [`HandoffGuard`] - Tracks the single detail-view hand-off

mod handoff_guard;
mod unit_set;

pub use handoff_guard::HandoffGuard;
pub use unit_set::UnitSet;
