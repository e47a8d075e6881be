//! Per-phase parameters and outcomes.

use std::sync::Arc;
use std::time::Duration;

use summon_core::{AbortReason, PhaseName, PhaseSpec, ProjectDescriptor};

/// Parameters handed to every unit playing a phase.
#[derive(Debug, Clone)]
pub struct PhaseParams {
    pub spec: PhaseSpec,
    pub descriptor: Arc<ProjectDescriptor>,
    /// Rarity-driven intensity multiplier (1.0 for common)
    pub intensity: f32,
}

impl PhaseParams {
    pub fn new(spec: PhaseSpec, descriptor: Arc<ProjectDescriptor>) -> Self {
        let intensity = descriptor.rarity.intensity();
        Self {
            spec,
            descriptor,
            intensity,
        }
    }

    pub fn phase(&self) -> PhaseName {
        self.spec.name
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.spec.duration_ms)
    }

    pub fn duration_secs(&self) -> f32 {
        self.spec.duration_ms as f32 / 1000.0
    }
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Scheduled duration elapsed and every unit future resolved
    Satisfied,
    /// The hard ceiling was hit first
    ForceAdvanced { budget: Duration },
    Aborted(AbortReason),
}
