//! Instrumented units, back ends and presenters shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator::backend::{
    AudioBackend, AudioError, RenderBackend, RenderError, RenderFrame, SurfaceId, SurfaceRequest,
    ToneClip,
};
use orchestrator::core::{EffectUnit, PhaseParams, UnitConfig, UnitFactory, UnitKind};
use orchestrator::units::PlaybackGate;
use orchestrator::{
    Capabilities, DetailPresenter, PhaseTimeline, PresentError, SequenceConfig, UnitError,
};
use summon_core::{PhaseName, PhaseSpec, ProjectDescriptor, RarityTier, ScreenAnchor};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn descriptor() -> ProjectDescriptor {
    ProjectDescriptor::new("atlas", "Atlas")
        .with_rarity(RarityTier::Legendary)
        .with_category("Tooling")
        .with_importance(5.0)
}

/// Full six-phase timeline, 0..9000 ms.
pub fn full_config() -> SequenceConfig {
    SequenceConfig::default()
}

/// Per-unit lifecycle counters.
#[derive(Debug, Default)]
pub struct Tally {
    pub prepares: AtomicUsize,
    pub cancels: AtomicUsize,
    pub disposes: AtomicUsize,
    pub plays: Mutex<Vec<(UnitKind, PhaseName)>>,
}

impl Tally {
    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn disposes(&self) -> usize {
        self.disposes.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> Vec<(UnitKind, PhaseName)> {
        self.plays.lock().unwrap().clone()
    }
}

/// Unit that plays for the whole phase and counts every lifecycle call.
pub struct ScriptedUnit {
    kind: UnitKind,
    phases: Vec<PhaseName>,
    fail_prepare: bool,
    panic_prepare: bool,
    stall_in: Option<PhaseName>,
    fail_in: Option<PhaseName>,
    panic_in: Option<PhaseName>,
    gate: PlaybackGate,
    tally: Arc<Tally>,
    cancels: AtomicUsize,
}

#[async_trait]
impl EffectUnit for ScriptedUnit {
    fn kind(&self) -> UnitKind {
        self.kind
    }

    fn phases(&self) -> Vec<PhaseName> {
        self.phases.clone()
    }

    fn prepare(&mut self, _config: &UnitConfig) -> Result<(), UnitError> {
        if self.panic_prepare {
            panic!("{} lost its context", self.kind);
        }
        if self.fail_prepare {
            return Err(UnitError::Allocation(format!("{} has no surface", self.kind)));
        }
        self.tally.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self, params: &PhaseParams) -> Result<(), UnitError> {
        self.tally
            .plays
            .lock()
            .unwrap()
            .push((self.kind, params.phase()));
        if self.stall_in == Some(params.phase()) {
            // Ignores cancellation entirely
            std::future::pending::<()>().await;
        }
        if self.fail_in == Some(params.phase()) {
            self.gate.sleep(params.duration() / 2).await;
            return Err(UnitError::Playback(format!("{} dropped a frame", self.kind)));
        }
        if self.panic_in == Some(params.phase()) {
            self.gate.sleep(params.duration() / 2).await;
            panic!("{} shader crashed", self.kind);
        }
        self.gate.sleep(params.duration()).await;
        Ok(())
    }

    fn cancel(&self) {
        // Tally counts distinct units cancelled
        if self.cancels.fetch_add(1, Ordering::SeqCst) == 0 {
            self.tally.cancels.fetch_add(1, Ordering::SeqCst);
        }
        self.gate.cancel();
    }

    fn reset(&self) {
        self.gate.clear();
    }

    fn dispose(&self) {
        self.gate.cancel();
        self.tally.disposes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory producing [`ScriptedUnit`]s that all share one [`Tally`].
#[derive(Default)]
pub struct ScriptedUnits {
    pub tally: Arc<Tally>,
    pub failing: Vec<UnitKind>,
    pub panicking: Vec<UnitKind>,
    pub stall: Option<(UnitKind, PhaseName)>,
    pub fail_play: Option<(UnitKind, PhaseName)>,
    pub panic_play: Option<(UnitKind, PhaseName)>,
}

impl ScriptedUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, kind: UnitKind) -> Self {
        self.failing.push(kind);
        self
    }

    pub fn panicking(mut self, kind: UnitKind) -> Self {
        self.panicking.push(kind);
        self
    }

    pub fn failing_play(mut self, kind: UnitKind, phase: PhaseName) -> Self {
        self.fail_play = Some((kind, phase));
        self
    }

    pub fn panicking_play(mut self, kind: UnitKind, phase: PhaseName) -> Self {
        self.panic_play = Some((kind, phase));
        self
    }

    pub fn stalling(mut self, kind: UnitKind, phase: PhaseName) -> Self {
        self.stall = Some((kind, phase));
        self
    }
}

impl UnitFactory for ScriptedUnits {
    fn create(&self, kind: UnitKind, _capabilities: &Capabilities) -> Box<dyn EffectUnit> {
        let phases = match kind {
            UnitKind::Emblem => vec![PhaseName::Emblem, PhaseName::Handoff],
            UnitKind::Particle => vec![PhaseName::EnergyGather, PhaseName::Burst],
            UnitKind::CardReveal => {
                vec![PhaseName::Reveal, PhaseName::Settle, PhaseName::Handoff]
            }
            UnitKind::Sound => PhaseName::ALL.to_vec(),
        };
        Box::new(ScriptedUnit {
            kind,
            phases,
            fail_prepare: self.failing.contains(&kind),
            panic_prepare: self.panicking.contains(&kind),
            stall_in: phase_for(self.stall, kind),
            fail_in: phase_for(self.fail_play, kind),
            panic_in: phase_for(self.panic_play, kind),
            gate: PlaybackGate::new(),
            tally: self.tally.clone(),
            cancels: AtomicUsize::new(0),
        })
    }
}

fn phase_for(target: Option<(UnitKind, PhaseName)>, kind: UnitKind) -> Option<PhaseName> {
    target.and_then(|(k, phase)| (k == kind).then_some(phase))
}

/// Presenter that records each call.
#[derive(Default)]
pub struct RecordingPresenter {
    pub calls: Mutex<Vec<(String, ScreenAnchor)>>,
    pub fail: bool,
}

impl RecordingPresenter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DetailPresenter for RecordingPresenter {
    async fn show(
        &self,
        descriptor: &ProjectDescriptor,
        anchor: &ScreenAnchor,
    ) -> Result<(), PresentError> {
        self.calls
            .lock()
            .unwrap()
            .push((descriptor.id.clone(), *anchor));
        if self.fail {
            return Err(PresentError::Unavailable("route not mounted".into()));
        }
        Ok(())
    }
}

/// Render back end that counts surfaces and frames.
#[derive(Default)]
pub struct CountingRenderer {
    pub allocated: Mutex<Vec<SurfaceRequest>>,
    pub released: AtomicUsize,
    pub frames: AtomicUsize,
}

impl RenderBackend for CountingRenderer {
    fn allocate(&self, request: SurfaceRequest) -> Result<SurfaceId, RenderError> {
        let mut allocated = self.allocated.lock().unwrap();
        allocated.push(request);
        Ok(SurfaceId(allocated.len() as u64))
    }

    fn submit(&self, _surface: SurfaceId, _frame: RenderFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self, _surface: SurfaceId) {}

    fn release(&self, _surface: SurfaceId) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Audio back end that records clip phases.
#[derive(Default)]
pub struct CountingAudio {
    pub clips: Mutex<Vec<PhaseName>>,
    pub closes: AtomicUsize,
}

impl AudioBackend for CountingAudio {
    fn open(&self, _voices: u32) -> Result<(), AudioError> {
        Ok(())
    }

    fn play(&self, clip: ToneClip) {
        self.clips.lock().unwrap().push(clip.phase);
    }

    fn stop_all(&self) {}

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn short_timeline() -> PhaseTimeline {
    PhaseTimeline::new(vec![
        PhaseSpec::new(PhaseName::Emblem, 0, 400),
        PhaseSpec::new(PhaseName::Burst, 400, 400),
        PhaseSpec::new(PhaseName::Reveal, 800, 800),
        PhaseSpec::new(PhaseName::Handoff, 1600, 200),
    ])
    .unwrap()
}

pub const SHORT_TOTAL: Duration = Duration::from_millis(1800);
