use summon_core::{AbortReason, CoreError, PhaseName};
use thiserror::Error;

use crate::core::UnitKind;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Sequence already started")]
    AlreadyStarted,

    #[error("Unit {unit} setup failed: {reason}")]
    Setup { unit: UnitKind, reason: String },

    #[error("Unit {unit} failed during phase {phase}: {reason}")]
    PhaseRuntime {
        phase: PhaseName,
        unit: UnitKind,
        reason: String,
    },

    #[error("Phase {phase} exceeded its {budget_ms}ms ceiling")]
    TimeoutExceeded { phase: PhaseName, budget_ms: u64 },

    #[error("Sequence aborted: {}", reason.as_str())]
    Aborted { reason: AbortReason },

    #[error("Domain error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrchestratorError {
    /// Create a setup error for a unit that could not be prepared.
    pub fn setup_failed(unit: UnitKind, reason: impl Into<String>) -> Self {
        Self::Setup {
            unit,
            reason: reason.into(),
        }
    }

    /// Create a runtime error for a unit that failed inside a phase.
    pub fn phase_failed(phase: PhaseName, unit: UnitKind, reason: impl Into<String>) -> Self {
        Self::PhaseRuntime {
            phase,
            unit,
            reason: reason.into(),
        }
    }

    /// Whether the sequence can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Setup { .. } | Self::PhaseRuntime { .. } | Self::TimeoutExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure reported by an individual effect unit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("{0} is already prepared; dispose it first")]
    AlreadyPrepared(UnitKind),

    #[error("{0} was used before prepare or after dispose")]
    NotPrepared(UnitKind),

    #[error("Resource allocation failed: {0}")]
    Allocation(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panicked".to_string()
    }
}
