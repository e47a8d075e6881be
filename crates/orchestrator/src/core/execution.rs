//! Phase execution.
//!
//! A phase is satisfied when its scheduled duration has elapsed AND every
//! participating unit's `play` future has resolved. A hard ceiling bounds
//! the wait so a stalled unit cannot hang the sequence, and cancellation
//! preempts everything.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use summon_core::{AbortReason, PhaseSpec};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::error::panic_message;
use crate::timeline::clamp_ceiling_factor;

use super::phase::{PhaseOutcome, PhaseParams};
use super::unit::{EffectUnit, UnitKind};

/// Result of driving one phase.
#[derive(Debug, Clone)]
pub struct PhaseRun {
    pub outcome: PhaseOutcome,
    /// Units whose `play` returned an error or panicked
    pub failures: Vec<(UnitKind, String)>,
    /// Wall time between the phase starting and the runner returning
    pub waited: Duration,
}

/// Drives phases relative to a fixed sequence origin.
#[derive(Debug, Clone)]
pub struct PhaseRunner {
    origin: Instant,
    ceiling_factor: f64,
    global_deadline: Option<Instant>,
    token: CancellationToken,
}

impl PhaseRunner {
    pub fn new(origin: Instant, token: CancellationToken) -> Self {
        Self {
            origin,
            ceiling_factor: 1.5,
            global_deadline: None,
            token,
        }
    }

    /// Per-phase ceiling is `duration * factor`; the whole sequence is
    /// additionally capped at `total * factor` from the origin.
    pub fn with_ceiling(mut self, factor: f64, total: Duration) -> Self {
        let factor = clamp_ceiling_factor(factor);
        self.ceiling_factor = factor;
        self.global_deadline = Some(self.origin + total.mul_f64(factor));
        self
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    /// Wait out any gap before `spec` starts. An overrunning predecessor
    /// means the phase is already due.
    pub async fn wait_until_due(&self, spec: &PhaseSpec) -> Result<(), AbortReason> {
        let scheduled = self.origin + Duration::from_millis(spec.start_offset_ms);
        tokio::select! {
            biased;
            reason = self.token.cancelled() => Err(reason),
            _ = sleep_until(scheduled) => Ok(()),
        }
    }

    pub async fn run(&self, units: &[Arc<dyn EffectUnit>], params: &PhaseParams) -> PhaseRun {
        let phase = params.phase();
        let started = Instant::now();
        let min_end = started + params.duration();
        let budget = params.duration().mul_f64(self.ceiling_factor);
        let ceiling = match self.global_deadline {
            Some(deadline) => (started + budget).min(deadline),
            None => started + budget,
        };

        let participants: Vec<&Arc<dyn EffectUnit>> = units
            .iter()
            .filter(|unit| unit.participates_in(phase))
            .collect();
        debug!(phase = %phase, units = participants.len(), "Running phase");

        let failures = Mutex::new(Vec::new());
        let work = async {
            let plays = participants.iter().map(|unit| {
                let kind = unit.kind();
                let failures = &failures;
                async move {
                    let result = AssertUnwindSafe(unit.play(params)).catch_unwind().await;
                    let reason = match result {
                        Ok(Ok(())) => return,
                        Ok(Err(e)) => e.to_string(),
                        Err(payload) => panic_message(payload.as_ref()),
                    };
                    warn!(phase = %phase, unit = %kind, reason = %reason, "Unit failed during phase");
                    failures
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((kind, reason));
                }
            });
            tokio::join!(join_all(plays), sleep_until(min_end));
        };

        let outcome = tokio::select! {
            biased;
            reason = self.token.cancelled() => PhaseOutcome::Aborted(reason),
            _ = work => PhaseOutcome::Satisfied,
            _ = sleep_until(ceiling) => PhaseOutcome::ForceAdvanced {
                budget: ceiling.saturating_duration_since(started),
            },
        };

        PhaseRun {
            outcome,
            failures: failures.into_inner().unwrap_or_else(PoisonError::into_inner),
            waited: Instant::now().saturating_duration_since(started),
        }
    }
}
