//! Sequencer: walks the phase timeline with the units a tier selects.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use events::{Event, EventBus};
use summon_core::{
    AbortReason, PerformanceTier, PhaseName, ProjectDescriptor, SequenceOutcome, SequenceState,
    SequenceStatus, SkipReason, TierBudget, TierBudgets,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::Capabilities;
use crate::cancellation::CancellationToken;
use crate::clock::FrameClock;
use crate::core::{
    EffectUnit, OrderedEventEmitter, PhaseOutcome, PhaseParams, PhaseRunner, UnitConfig,
    UnitFactory, UnitKind,
};
use crate::error::{panic_message, OrchestratorError, Result};
use crate::resources::UnitSet;
use crate::state_machine::SequenceStateMachine;
use crate::timeline::PhaseTimeline;
use crate::units::StandardUnits;

/// Static inputs for one sequence.
#[derive(Debug, Clone)]
pub struct SequenceConfig {
    pub timeline: PhaseTimeline,
    pub ceiling_factor: f64,
    pub budgets: TierBudgets,
    pub clock: FrameClock,
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            timeline: PhaseTimeline::default(),
            ceiling_factor: 1.5,
            budgets: TierBudgets::default(),
            clock: FrameClock::default(),
            seed: 0x5EED,
        }
    }
}

/// What a finished sequence looked like.
#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub invocation_id: Uuid,
    pub outcome: SequenceOutcome,
    pub state: SequenceState,
    pub elapsed: Duration,
    pub prepared_units: Vec<UnitKind>,
}

/// Runs one summoning sequence.
///
/// The orchestrator is the single writer of [`SequenceState`]; readers get
/// snapshots through [`Orchestrator::subscribe`]. Cancellation goes through
/// the shared [`CancellationToken`] and reaches every prepared unit
/// synchronously.
pub struct Orchestrator {
    invocation_id: Uuid,
    config: SequenceConfig,
    factory: Arc<dyn UnitFactory>,
    capabilities: Capabilities,
    emitter: Option<OrderedEventEmitter>,
    token: CancellationToken,
    state: watch::Sender<SequenceState>,
    started: AtomicBool,
}

impl Orchestrator {
    pub fn new(config: SequenceConfig) -> Self {
        let (state, _) = watch::channel(SequenceState::new());
        Self {
            invocation_id: Uuid::new_v4(),
            config,
            factory: Arc::new(StandardUnits::new()),
            capabilities: Capabilities::new(),
            emitter: None,
            token: CancellationToken::new(),
            state,
            started: AtomicBool::new(false),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn UnitFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.emitter = Some(OrderedEventEmitter::new(bus));
        self
    }

    pub fn with_emitter(mut self, emitter: OrderedEventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_invocation_id(mut self, invocation_id: Uuid) -> Self {
        self.invocation_id = invocation_id;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request an abort. Returns false if one was already requested.
    pub fn abort(&self, reason: AbortReason) -> bool {
        let first = self.token.cancel(reason);
        if first {
            info!(
                invocation_id = %self.invocation_id,
                reason = reason.as_str(),
                "Sequence abort requested"
            );
        }
        first
    }

    pub fn subscribe(&self) -> watch::Receiver<SequenceState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SequenceState {
        self.state.borrow().clone()
    }

    fn emit(&self, event: Event) {
        if let Some(ref emitter) = self.emitter {
            emitter.emit(event);
        }
    }

    fn transition(&self, to: SequenceStatus) -> Result<()> {
        let from = self.state.borrow().status;
        SequenceStateMachine::validate_transition(&from, &to)?;
        self.state.send_modify(|state| state.status = to);
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut SequenceState)) {
        self.state.send_modify(f);
    }

    /// Run the sequence to a terminal state.
    ///
    /// Errors are limited to misuse (`AlreadyStarted`, an invalid
    /// descriptor); unit failures degrade the spectacle and are reported
    /// through the state and the event stream.
    pub async fn start(
        &self,
        descriptor: Arc<ProjectDescriptor>,
        tier: PerformanceTier,
    ) -> Result<SequenceReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyStarted);
        }
        descriptor.validate()?;

        let origin = Instant::now();
        info!(
            invocation_id = %self.invocation_id,
            project_id = %descriptor.id,
            tier = tier.as_str(),
            "Starting sequence"
        );
        self.emit(Event::SequenceStarted {
            invocation_id: self.invocation_id,
            project_id: descriptor.id.clone(),
            tier: tier.as_str().to_string(),
        });

        self.transition(SequenceStatus::Setup)?;
        let budget = self.config.budgets.get(tier);
        let kinds = UnitKind::for_tier(tier, &budget);
        let (mut units, setup_failures) = self.setup_units(&descriptor, tier, budget, &kinds);

        let skip = if kinds.is_empty() {
            Some(SkipReason::MinimalTier)
        } else if !units.has_visual() {
            Some(if setup_failures > 0 {
                SkipReason::SetupFailed
            } else {
                SkipReason::NoUnitsPrepared
            })
        } else {
            None
        };

        let outcome = match skip {
            Some(reason) => {
                info!(
                    invocation_id = %self.invocation_id,
                    reason = reason.as_str(),
                    "Skipping spectacle"
                );
                self.transition(SequenceStatus::Completing)?;
                units.dispose_all();
                self.transition(SequenceStatus::Completed)?;
                SequenceOutcome::Skipped { reason }
            }
            None => self.run_phases(&descriptor, &mut units, origin).await?,
        };

        let elapsed = origin.elapsed();
        self.update(|state| state.elapsed_ms = elapsed.as_millis() as u64);
        info!(
            invocation_id = %self.invocation_id,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Sequence finished"
        );
        self.emit(Event::SequenceFinished {
            invocation_id: self.invocation_id,
            outcome: outcome.as_str().to_string(),
            elapsed_ms: elapsed.as_millis() as u64,
        });

        Ok(SequenceReport {
            invocation_id: self.invocation_id,
            outcome,
            state: self.state(),
            elapsed,
            prepared_units: units.kinds(),
        })
    }

    /// Create and prepare every selected unit. Failures exclude the unit
    /// and are returned as a count.
    fn setup_units(
        &self,
        descriptor: &Arc<ProjectDescriptor>,
        tier: PerformanceTier,
        budget: TierBudget,
        kinds: &[UnitKind],
    ) -> (UnitSet, usize) {
        let mut units = UnitSet::new();
        let mut failures = 0;

        for &kind in kinds {
            let mut unit = self.factory.create(kind, &self.capabilities);
            let config = UnitConfig {
                tier,
                budget,
                clock: self.config.clock,
                descriptor: descriptor.clone(),
                seed: self.config.seed,
            };

            let reason = match std::panic::catch_unwind(AssertUnwindSafe(|| unit.prepare(&config))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(unit = %kind, panic = %reason, "Unit panicked during prepare");
                    Some(reason)
                }
            };

            match reason {
                None => {
                    debug!(unit = %kind, "Unit prepared");
                    self.emit(Event::UnitPrepared {
                        invocation_id: self.invocation_id,
                        unit: kind.to_string(),
                    });
                    units.push(Arc::from(unit));
                }
                Some(reason) => {
                    failures += 1;
                    let err = OrchestratorError::setup_failed(kind, reason.clone());
                    warn!(
                        invocation_id = %self.invocation_id,
                        unit = %kind,
                        error = %err,
                        "Excluding unit from sequence"
                    );
                    self.update(|state| state.record_error(err.to_string()));
                    self.emit(Event::UnitSetupFailed {
                        invocation_id: self.invocation_id,
                        unit: kind.to_string(),
                        reason,
                    });
                }
            }
        }

        (units, failures)
    }

    async fn run_phases(
        &self,
        descriptor: &Arc<ProjectDescriptor>,
        units: &mut UnitSet,
        origin: Instant,
    ) -> Result<SequenceOutcome> {
        let weak: Vec<Weak<dyn EffectUnit>> = units.units().iter().map(Arc::downgrade).collect();
        self.token.on_cancel(move |_| {
            for unit in weak.iter().filter_map(Weak::upgrade) {
                unit.cancel();
            }
        });

        let timeline = &self.config.timeline;
        let runner = PhaseRunner::new(origin, self.token.clone()).with_ceiling(
            self.config.ceiling_factor,
            Duration::from_millis(timeline.total_duration_ms()),
        );

        let mut abort: Option<AbortReason> = self.token.reason();
        if abort.is_none() {
            for (index, spec) in timeline.phases().iter().enumerate() {
                if let Err(reason) = runner.wait_until_due(spec).await {
                    abort = Some(reason);
                    break;
                }

                let phase = spec.name;
                let elapsed_ms = runner.elapsed().as_millis() as u64;
                self.transition(SequenceStatus::Running)?;
                self.update(|state| state.enter_phase(phase, elapsed_ms));
                debug!(invocation_id = %self.invocation_id, phase = %phase, elapsed_ms, "Phase started");
                self.emit(Event::PhaseStarted {
                    invocation_id: self.invocation_id,
                    phase: phase.to_string(),
                    index,
                    elapsed_ms,
                });

                let params = PhaseParams::new(*spec, descriptor.clone());
                let run = runner.run(units.units(), &params).await;

                for (unit, reason) in run.failures {
                    let err = OrchestratorError::phase_failed(phase, unit, reason.clone());
                    self.update(|state| state.record_error(err.to_string()));
                    self.emit(Event::PhaseFailed {
                        invocation_id: self.invocation_id,
                        phase: phase.to_string(),
                        unit: unit.to_string(),
                        reason,
                    });
                }

                match run.outcome {
                    PhaseOutcome::Satisfied => {}
                    PhaseOutcome::ForceAdvanced { budget } => {
                        let err = OrchestratorError::TimeoutExceeded {
                            phase,
                            budget_ms: budget.as_millis() as u64,
                        };
                        warn!(
                            invocation_id = %self.invocation_id,
                            phase = %phase,
                            error = %err,
                            "Force-advancing past stalled phase"
                        );
                        self.update(|state| state.timing_warnings += 1);
                        self.emit(Event::TimingWarning {
                            invocation_id: self.invocation_id,
                            phase: phase.to_string(),
                            budget_ms: budget.as_millis() as u64,
                            waited_ms: run.waited.as_millis() as u64,
                        });
                    }
                    PhaseOutcome::Aborted(reason) => {
                        abort = Some(reason);
                        break;
                    }
                }

                let elapsed_ms = runner.elapsed().as_millis() as u64;
                self.update(|state| state.finish_phase(phase, elapsed_ms));
                self.emit(Event::PhaseCompleted {
                    invocation_id: self.invocation_id,
                    phase: phase.to_string(),
                    elapsed_ms,
                });
            }
        }

        match abort {
            Some(reason) => {
                let phase = self.state.borrow().current_phase;
                self.finish_aborted(units, reason, phase)?;
                Ok(SequenceOutcome::Aborted { reason, phase })
            }
            None => {
                self.transition(SequenceStatus::Completing)?;
                units.dispose_all();
                self.transition(SequenceStatus::Completed)?;
                Ok(SequenceOutcome::Completed)
            }
        }
    }

    fn finish_aborted(
        &self,
        units: &mut UnitSet,
        reason: AbortReason,
        phase: Option<PhaseName>,
    ) -> Result<()> {
        self.transition(SequenceStatus::Aborting)?;
        self.update(|state| state.aborted = true);
        info!(
            invocation_id = %self.invocation_id,
            reason = reason.as_str(),
            phase = ?phase,
            "Sequence aborted"
        );
        self.emit(Event::SequenceAborted {
            invocation_id: self.invocation_id,
            reason: reason.as_str().to_string(),
            phase: phase.map(|p| p.to_string()),
        });

        // Listener already cancelled the units; this covers an abort that
        // raced the listener registration
        units.cancel_all();
        units.dispose_all();
        self.transition(SequenceStatus::Aborted)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("invocation_id", &self.invocation_id)
            .field("status", &self.state.borrow().status)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}
