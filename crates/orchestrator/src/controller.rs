//! Transition controller: the public entry point.
//!
//! One `present` call classifies the device, runs the spectacle (unless
//! the tier is minimal), and always ends with exactly one hand-off to the
//! detail presenter, whatever happened in between.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use events::{Event, EventBus};
use futures::FutureExt;
use summon_core::{
    AbortReason, PerformanceTier, PhaseName, ProjectDescriptor, ScreenAnchor, SequenceOutcome,
    SequenceState, SkipReason,
};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::Capabilities;
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{OrderedEventEmitter, UnitFactory};
use crate::error::panic_message;
use crate::profiler::DeviceProfiler;
use crate::resources::HandoffGuard;
use crate::sequencer::Orchestrator;
use crate::skip::{SkipChannel, SkipInput};
use crate::units::StandardUnits;

/// How long an aborted run may take to unwind before it is dropped.
const ABORT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PresentError {
    #[error("detail view unavailable: {0}")]
    Unavailable(String),

    #[error("detail view failed: {0}")]
    Failed(String),
}

/// Collaborator that renders the project's full detail view.
#[async_trait]
pub trait DetailPresenter: Send + Sync {
    async fn show(
        &self,
        descriptor: &ProjectDescriptor,
        anchor: &ScreenAnchor,
    ) -> Result<(), PresentError>;
}

/// Summary of one `present` call.
#[derive(Debug, Clone)]
pub struct TransitionReport {
    pub invocation_id: Uuid,
    pub tier: PerformanceTier,
    pub outcome: SequenceOutcome,
    pub last_error: Option<String>,
    pub phases_run: Vec<PhaseName>,
    pub elapsed: Duration,
    /// Set when the presenter failed; the hand-off was still attempted once
    pub handoff_error: Option<String>,
}

impl TransitionReport {
    pub fn handoff_ok(&self) -> bool {
        self.handoff_error.is_none()
    }
}

pub struct TransitionController {
    config: EngineConfig,
    profiler: DeviceProfiler,
    presenter: Arc<dyn DetailPresenter>,
    factory: Arc<dyn UnitFactory>,
    capabilities: Capabilities,
    skip: SkipChannel,
    emitter: Option<OrderedEventEmitter>,
}

impl TransitionController {
    pub fn new(presenter: Arc<dyn DetailPresenter>) -> Self {
        Self {
            config: EngineConfig::default(),
            profiler: DeviceProfiler::default(),
            presenter,
            factory: Arc::new(StandardUnits::new()),
            capabilities: Capabilities::new(),
            skip: SkipChannel::new(),
            emitter: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_profiler(mut self, profiler: DeviceProfiler) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn UnitFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_skip_channel(mut self, skip: SkipChannel) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.emitter = Some(OrderedEventEmitter::new(bus));
        self
    }

    /// Channel the host forwards key and backdrop input into.
    pub fn skip_channel(&self) -> &SkipChannel {
        &self.skip
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Present a project. Never fails: every path ends in the hand-off.
    pub async fn present(&self, descriptor: ProjectDescriptor, anchor: ScreenAnchor) -> TransitionReport {
        let invocation_id = Uuid::new_v4();
        let started = Instant::now();
        let descriptor = Arc::new(descriptor);
        let tier = match self.config.force_tier {
            Some(tier) => {
                debug!(tier = tier.as_str(), "Using forced performance tier");
                tier
            }
            None => self.profiler.classify(),
        };

        info!(
            invocation_id = %invocation_id,
            project_id = %descriptor.id,
            tier = tier.as_str(),
            "Presenting project"
        );
        let mut guard = HandoffGuard::new(invocation_id, descriptor.id.clone(), self.emitter.clone());

        let (outcome, state) = if tier == PerformanceTier::Minimal {
            info!(invocation_id = %invocation_id, "Minimal tier, skipping spectacle");
            (
                SequenceOutcome::Skipped {
                    reason: SkipReason::MinimalTier,
                },
                SequenceState::new(),
            )
        } else {
            self.run_sequence(invocation_id, descriptor.clone(), tier).await
        };

        let handoff_error = self.hand_off(&mut guard, &descriptor, &anchor).await;
        let elapsed = started.elapsed();
        info!(
            invocation_id = %invocation_id,
            outcome = outcome.as_str(),
            elapsed_ms = elapsed.as_millis() as u64,
            handoff_ok = handoff_error.is_none(),
            "Presentation finished"
        );

        TransitionReport {
            invocation_id,
            tier,
            outcome,
            last_error: state.last_error,
            phases_run: state.completed_phases,
            elapsed,
            handoff_error,
        }
    }

    async fn run_sequence(
        &self,
        invocation_id: Uuid,
        descriptor: Arc<ProjectDescriptor>,
        tier: PerformanceTier,
    ) -> (SequenceOutcome, SequenceState) {
        let token = CancellationToken::new();
        let mut orchestrator = Orchestrator::new(self.config.sequence_config())
            .with_invocation_id(invocation_id)
            .with_factory(self.factory.clone())
            .with_capabilities(self.capabilities.clone())
            .with_cancellation_token(token.clone());
        if let Some(ref emitter) = self.emitter {
            orchestrator = orchestrator.with_emitter(emitter.clone());
        }
        let state = orchestrator.subscribe();

        // Subscribed for this invocation only; dropped when the select ends
        let skip_rx = self.skip.subscribe();
        let interrupts = watch_interrupts(skip_rx, &self.config.skip_keys, self.config.watchdog(), &token);
        let run = AssertUnwindSafe(orchestrator.start(descriptor, tier)).catch_unwind();

        let result = tokio::select! {
            biased;
            result = run => Some(result),
            _ = interrupts => None,
        };

        let snapshot = state.borrow().clone();
        match result {
            Some(Ok(Ok(report))) => (report.outcome, report.state),
            Some(Ok(Err(e))) => {
                warn!(invocation_id = %invocation_id, error = %e, "Sequence could not run");
                self.emit_error(invocation_id, e.to_string());
                let mut snapshot = snapshot;
                snapshot.record_error(e.to_string());
                (
                    SequenceOutcome::Skipped {
                        reason: SkipReason::SetupFailed,
                    },
                    snapshot,
                )
            }
            Some(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                error!(invocation_id = %invocation_id, panic = %message, "Sequence panicked");
                self.emit_error(invocation_id, message.clone());
                let mut snapshot = snapshot;
                snapshot.record_error(message);
                let phase = snapshot.current_phase;
                (
                    SequenceOutcome::Aborted {
                        reason: AbortReason::Fault,
                        phase,
                    },
                    snapshot,
                )
            }
            None => {
                // The run ignored cancellation past the grace period and was dropped
                let reason = token.reason().unwrap_or(AbortReason::Watchdog);
                warn!(
                    invocation_id = %invocation_id,
                    reason = reason.as_str(),
                    "Sequence did not unwind in time, dropping it"
                );
                let phase = snapshot.current_phase;
                (SequenceOutcome::Aborted { reason, phase }, snapshot)
            }
        }
    }

    async fn hand_off(
        &self,
        guard: &mut HandoffGuard,
        descriptor: &ProjectDescriptor,
        anchor: &ScreenAnchor,
    ) -> Option<String> {
        if !guard.claim() {
            return None;
        }
        let (origin_x, origin_y) = anchor.center();
        debug!(project_id = %descriptor.id, origin_x, origin_y, "Handing off to detail view");
        let result = AssertUnwindSafe(self.presenter.show(descriptor, anchor))
            .catch_unwind()
            .await;
        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!(project_id = %descriptor.id, error = %e, "Detail presenter failed");
                Some(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(project_id = %descriptor.id, panic = %message, "Detail presenter panicked");
                Some(message)
            }
        };
        guard.mark_delivered(error.is_none());
        error
    }

    fn emit_error(&self, invocation_id: Uuid, message: String) {
        if let Some(ref emitter) = self.emitter {
            emitter.emit(Event::Error {
                message,
                context: Some(invocation_id.to_string()),
            });
        }
    }
}

impl std::fmt::Debug for TransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionController")
            .field("config", &self.config)
            .field("profiler", &self.profiler)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Cancel `token` on the first skip input or when the watchdog fires, then
/// give the run `ABORT_GRACE` to unwind before resolving.
async fn watch_interrupts(
    mut skip: broadcast::Receiver<SkipInput>,
    skip_keys: &[String],
    watchdog: Duration,
    token: &CancellationToken,
) {
    let deadline = tokio::time::sleep(watchdog);
    tokio::pin!(deadline);
    let mut skip_open = true;

    let reason = loop {
        tokio::select! {
            _ = &mut deadline => break AbortReason::Watchdog,
            input = skip.recv(), if skip_open => match input {
                Ok(input) => {
                    if let Some(reason) = input.abort_reason(skip_keys) {
                        break reason;
                    }
                    debug!(input = ?input, "Ignoring non-skip input");
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Skip receiver lagged");
                }
                Err(RecvError::Closed) => skip_open = false,
            },
        }
    };

    if reason == AbortReason::Watchdog {
        warn!(watchdog_ms = watchdog.as_millis() as u64, "Watchdog fired");
    }
    token.cancel(reason);
    tokio::time::sleep(ABORT_GRACE).await;
}
