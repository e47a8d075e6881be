use serde::{Deserialize, Serialize};

use super::phase::PhaseName;

/// Lifecycle of one orchestrated sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    #[default]
    Idle,
    Setup,
    Running,
    Completing,
    Completed,
    Aborting,
    Aborted,
}

impl SequenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Setup => "setup",
            Self::Running => "running",
            Self::Completing => "completing",
            Self::Completed => "completed",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl std::fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a sequence was interrupted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    SkipKey,
    BackdropInteraction,
    Watchdog,
    Caller,
    /// The sequence itself failed and was torn down
    Fault,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipKey => "skip_key",
            Self::BackdropInteraction => "backdrop_interaction",
            Self::Watchdog => "watchdog",
            Self::Caller => "caller",
            Self::Fault => "fault",
        }
    }
}

/// Why the spectacle was skipped entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MinimalTier,
    NoUnitsPrepared,
    SetupFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinimalTier => "minimal_tier",
            Self::NoUnitsPrepared => "no_units_prepared",
            Self::SetupFailed => "setup_failed",
        }
    }
}

/// Terminal outcome of one sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceOutcome {
    Completed,
    Aborted {
        reason: AbortReason,
        phase: Option<PhaseName>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl SequenceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted { .. } => "aborted",
            Self::Skipped { .. } => "skipped",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Progress record for one sequence.
///
/// Written only by the orchestrator; everyone else reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SequenceState {
    pub status: SequenceStatus,
    pub current_phase: Option<PhaseName>,
    pub elapsed_ms: u64,
    pub aborted: bool,
    pub last_error: Option<String>,
    pub timing_warnings: u32,
    pub completed_phases: Vec<PhaseName>,
}

impl SequenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_phase(&mut self, phase: PhaseName, elapsed_ms: u64) {
        self.status = SequenceStatus::Running;
        self.current_phase = Some(phase);
        self.elapsed_ms = elapsed_ms;
    }

    pub fn finish_phase(&mut self, phase: PhaseName, elapsed_ms: u64) {
        self.elapsed_ms = elapsed_ms;
        if !self.completed_phases.contains(&phase) {
            self.completed_phases.push(phase);
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
