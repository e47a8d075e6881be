use serde::{Deserialize, Serialize};

/// Coarse classification of the runtime environment.
///
/// Computed once per presentation and immutable for its lifetime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Full,
    #[default]
    Reduced,
    Minimal,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reduced => "reduced",
            Self::Minimal => "minimal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "reduced" => Some(Self::Reduced),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }
}

/// Resource budget handed to effect units through their prepare config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TierBudget {
    /// Particles advected around the ring during energy gathering
    pub ring_particles: u32,
    /// Particles launched by the burst, before rarity scaling
    pub burst_particles: u32,
    /// Glyph markers on the emblem
    pub glyphs: u32,
    /// Polygon segments used for the card surface
    pub card_segments: u32,
    /// Simultaneous oscillator voices
    pub voices: u32,
    pub ring_flow: bool,
    pub sound: bool,
}

impl TierBudget {
    pub fn for_tier(tier: PerformanceTier) -> Self {
        match tier {
            PerformanceTier::Full => Self {
                ring_particles: 600,
                burst_particles: 400,
                glyphs: 8,
                card_segments: 64,
                voices: 4,
                ring_flow: true,
                sound: true,
            },
            PerformanceTier::Reduced => Self {
                ring_particles: 0,
                burst_particles: 120,
                glyphs: 6,
                card_segments: 16,
                voices: 2,
                ring_flow: false,
                sound: true,
            },
            PerformanceTier::Minimal => Self {
                ring_particles: 0,
                burst_particles: 0,
                glyphs: 0,
                card_segments: 0,
                voices: 0,
                ring_flow: false,
                sound: false,
            },
        }
    }
}

/// Per-tier budgets, overridable from engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TierBudgets {
    pub full: TierBudget,
    pub reduced: TierBudget,
    pub minimal: TierBudget,
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            full: TierBudget::for_tier(PerformanceTier::Full),
            reduced: TierBudget::for_tier(PerformanceTier::Reduced),
            minimal: TierBudget::for_tier(PerformanceTier::Minimal),
        }
    }
}

impl TierBudgets {
    pub fn get(&self, tier: PerformanceTier) -> TierBudget {
        match tier {
            PerformanceTier::Full => self.full,
            PerformanceTier::Reduced => self.reduced,
            PerformanceTier::Minimal => self.minimal,
        }
    }
}
