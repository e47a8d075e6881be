//! Declarative phase table.

use serde::{Deserialize, Serialize};
use summon_core::{CoreError, PhaseName, PhaseSpec};

const DEFAULT_PHASES: [PhaseSpec; 6] = [
    PhaseSpec::new(PhaseName::Emblem, 0, 2000),
    PhaseSpec::new(PhaseName::EnergyGather, 2000, 1500),
    PhaseSpec::new(PhaseName::Burst, 3500, 1000),
    PhaseSpec::new(PhaseName::Reveal, 4500, 3000),
    PhaseSpec::new(PhaseName::Settle, 7500, 500),
    PhaseSpec::new(PhaseName::Handoff, 8000, 1000),
];

/// Longest end offset a timeline may declare (one hour).
pub const MAX_TIMELINE_MS: u64 = 3_600_000;

/// Ceiling multipliers are clamped to `1.0..=MAX_CEILING_FACTOR`.
pub const MAX_CEILING_FACTOR: f64 = 10.0;

/// Ordered, validated sequence of phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PhaseSpec>", into = "Vec<PhaseSpec>")]
pub struct PhaseTimeline {
    phases: Vec<PhaseSpec>,
}

impl PhaseTimeline {
    pub fn new(phases: Vec<PhaseSpec>) -> Result<Self, CoreError> {
        Self::validate(&phases)?;
        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    /// End offset of the phase that finishes last.
    pub fn total_duration_ms(&self) -> u64 {
        self.phases
            .iter()
            .map(PhaseSpec::end_offset_ms)
            .max()
            .unwrap_or(0)
    }

    /// Upper bound on the whole sequence before force-advancing.
    pub fn hard_ceiling_ms(&self, factor: f64) -> u64 {
        (self.total_duration_ms() as f64 * clamp_ceiling_factor(factor)).round() as u64
    }

    /// Phase whose interval contains `elapsed_ms`; the latest match wins
    /// when intervals overlap. `None` past the end or inside a gap.
    pub fn phase_at(&self, elapsed_ms: u64) -> Option<&PhaseSpec> {
        self.phases.iter().rev().find(|p| p.contains(elapsed_ms))
    }

    pub fn validate(phases: &[PhaseSpec]) -> Result<(), CoreError> {
        if phases.is_empty() {
            return Err(CoreError::InvalidTimeline("timeline has no phases".to_string()));
        }

        for (i, phase) in phases.iter().enumerate() {
            if phase.duration_ms == 0 {
                return Err(CoreError::InvalidTimeline(format!(
                    "phase {} has zero duration",
                    phase.name
                )));
            }
            match phase.start_offset_ms.checked_add(phase.duration_ms) {
                Some(end) if end <= MAX_TIMELINE_MS => {}
                _ => {
                    return Err(CoreError::InvalidTimeline(format!(
                        "phase {} ends past the {}ms limit",
                        phase.name, MAX_TIMELINE_MS
                    )));
                }
            }
            if phases[..i].iter().any(|p| p.name == phase.name) {
                return Err(CoreError::InvalidTimeline(format!(
                    "phase {} appears more than once",
                    phase.name
                )));
            }
            if let Some(prev) = i.checked_sub(1).map(|j| &phases[j]) {
                if phase.start_offset_ms <= prev.start_offset_ms {
                    return Err(CoreError::InvalidTimeline(format!(
                        "phase {} starts at {}ms, not after {} at {}ms",
                        phase.name, phase.start_offset_ms, prev.name, prev.start_offset_ms
                    )));
                }
                if phase.name < prev.name {
                    return Err(CoreError::InvalidTimeline(format!(
                        "phase {} is out of order after {}",
                        phase.name, prev.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Non-finite or sub-1.0 factors fall back to 1.0.
pub fn clamp_ceiling_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor >= 1.0 {
        factor.min(MAX_CEILING_FACTOR)
    } else {
        1.0
    }
}

impl Default for PhaseTimeline {
    fn default() -> Self {
        Self {
            phases: DEFAULT_PHASES.to_vec(),
        }
    }
}

impl TryFrom<Vec<PhaseSpec>> for PhaseTimeline {
    type Error = CoreError;

    fn try_from(phases: Vec<PhaseSpec>) -> Result<Self, Self::Error> {
        Self::new(phases)
    }
}

impl From<PhaseTimeline> for Vec<PhaseSpec> {
    fn from(timeline: PhaseTimeline) -> Self {
        timeline.phases
    }
}
