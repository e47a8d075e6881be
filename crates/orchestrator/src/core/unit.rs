//! Effect unit contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use summon_core::{PerformanceTier, PhaseName, ProjectDescriptor, TierBudget};

use crate::backend::Capabilities;
use crate::clock::FrameClock;
use crate::error::UnitError;

use super::phase::PhaseParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Emblem,
    Particle,
    CardReveal,
    Sound,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emblem => "emblem",
            Self::Particle => "particle",
            Self::CardReveal => "card_reveal",
            Self::Sound => "sound",
        }
    }

    pub fn is_visual(&self) -> bool {
        !matches!(self, Self::Sound)
    }

    /// Units instantiated for a tier, in setup order.
    ///
    /// `Minimal` selects nothing, which makes the orchestrator skip the
    /// spectacle altogether.
    pub fn for_tier(tier: PerformanceTier, budget: &TierBudget) -> Vec<UnitKind> {
        if tier == PerformanceTier::Minimal {
            return Vec::new();
        }
        let mut kinds = vec![Self::Emblem, Self::Particle, Self::CardReveal];
        if budget.sound {
            kinds.push(Self::Sound);
        }
        kinds
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a unit needs to size its resources.
#[derive(Debug, Clone)]
pub struct UnitConfig {
    pub tier: PerformanceTier,
    pub budget: TierBudget,
    pub clock: FrameClock,
    pub descriptor: Arc<ProjectDescriptor>,
    /// Seed for any stochastic simulation, so runs are reproducible
    pub seed: u64,
}

/// A self-contained animated or audible subsystem.
///
/// Lifecycle: `prepare` once, any number of `play`/`reset` calls, then
/// `dispose`. `cancel` may be called at any point, including before
/// `prepare`, and must never block. After `cancel`, every `play` future
/// (in flight or new) resolves promptly until `reset` is called.
#[async_trait]
pub trait EffectUnit: Send + Sync {
    fn kind(&self) -> UnitKind;

    /// Phases this unit contributes to. Only meaningful after `prepare`.
    fn phases(&self) -> Vec<PhaseName>;

    /// Allocate resources sized by the tier budget.
    ///
    /// Calling it again without `dispose` is a usage error.
    fn prepare(&mut self, config: &UnitConfig) -> Result<(), UnitError>;

    /// Begin or advance this unit's contribution to a phase.
    async fn play(&self, params: &PhaseParams) -> Result<(), UnitError>;

    /// Best-effort immediate stop. Synchronous and idempotent.
    fn cancel(&self);

    /// Return to the pre-play state without releasing resources.
    fn reset(&self);

    /// Release every resource. Idempotent.
    fn dispose(&self);

    fn participates_in(&self, phase: PhaseName) -> bool {
        self.phases().contains(&phase)
    }
}

/// Creates concrete units for the kinds the orchestrator selects.
pub trait UnitFactory: Send + Sync {
    fn create(&self, kind: UnitKind, capabilities: &Capabilities) -> Box<dyn EffectUnit>;
}
