mod anchor;
mod phase;
mod project;
mod sequence;
mod tier;

pub use anchor::ScreenAnchor;
pub use phase::{PhaseName, PhaseSpec};
pub use project::{ProjectDescriptor, RarityTier};
pub use sequence::{AbortReason, SequenceOutcome, SequenceState, SequenceStatus, SkipReason};
pub use tier::{PerformanceTier, TierBudget, TierBudgets};
