use serde::{Deserialize, Serialize};

/// Named segment of the summoning sequence, in timeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub enum PhaseName {
    Emblem,
    EnergyGather,
    Burst,
    Reveal,
    Settle,
    Handoff,
}

impl PhaseName {
    pub const ALL: [PhaseName; 6] = [
        Self::Emblem,
        Self::EnergyGather,
        Self::Burst,
        Self::Reveal,
        Self::Settle,
        Self::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emblem => "emblem",
            Self::EnergyGather => "energyGather",
            Self::Burst => "burst",
            Self::Reveal => "reveal",
            Self::Settle => "settle",
            Self::Handoff => "handoff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "emblem" => Some(Self::Emblem),
            "energyGather" => Some(Self::EnergyGather),
            "burst" => Some(Self::Burst),
            "reveal" => Some(Self::Reveal),
            "settle" => Some(Self::Settle),
            "handoff" => Some(Self::Handoff),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the phase timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct PhaseSpec {
    pub name: PhaseName,
    pub start_offset_ms: u64,
    pub duration_ms: u64,
}

impl PhaseSpec {
    pub const fn new(name: PhaseName, start_offset_ms: u64, duration_ms: u64) -> Self {
        Self {
            name,
            start_offset_ms,
            duration_ms,
        }
    }

    pub fn end_offset_ms(&self) -> u64 {
        self.start_offset_ms.saturating_add(self.duration_ms)
    }

    /// Half-open interval check: `[start, end)`.
    pub fn contains(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.start_offset_ms && elapsed_ms < self.end_offset_ms()
    }
}
