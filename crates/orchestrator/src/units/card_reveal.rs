//! Card reveal: scale-in, three full turns, and a face swap hidden at an
//! edge-on angle.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use summon_core::{PhaseName, ProjectDescriptor};
use tracing::debug;

use crate::backend::{CardFace, CardFrame, FaceContent, RenderBackend, RenderFrame, SurfaceId, SurfaceRequest};
use crate::clock::FrameClock;
use crate::core::{EffectUnit, PhaseParams, UnitConfig, UnitKind};
use crate::easing::{lerp, progress, Ease};
use crate::error::UnitError;

use super::card_face::{compose_safely, FaceComposer};
use super::playback::{Lifecycle, PlaybackGate};

const SCALE_IN_FRACTION: f32 = 1.0 / 6.0;
const SPIN_FRACTION: f32 = 0.85;
const WOBBLE_DEG: f32 = 6.0;
const WOBBLE_CYCLES: f32 = 2.0;
const HANDOFF_SCALE: f32 = 0.6;

/// Pure motion plan for the reveal phase, in animation seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardMotion {
    span: f32,
}

impl CardMotion {
    pub const TOTAL_SPIN_DEG: f32 = 1080.0;
    /// 990° is 270° modulo a turn: the card is edge-on and neither face shows.
    pub const SWAP_ANGLE_DEG: f32 = 990.0;

    pub fn new(reveal_secs: f32) -> Self {
        Self {
            span: reveal_secs.max(0.0),
        }
    }

    pub fn scale_secs(&self) -> f32 {
        self.span * SCALE_IN_FRACTION
    }

    pub fn spin_secs(&self) -> f32 {
        self.span * SPIN_FRACTION
    }

    pub fn scale_at(&self, t: f32) -> f32 {
        Ease::OutBack.apply(progress(t, 0.0, self.scale_secs()))
    }

    pub fn rotation_at(&self, t: f32) -> f32 {
        Self::TOTAL_SPIN_DEG * Ease::InOutCubic.apply(progress(t, 0.0, self.spin_secs()))
    }

    pub fn is_complete(&self, t: f32) -> bool {
        t >= self.spin_secs() && t >= self.scale_secs()
    }
}

#[derive(Debug, Clone)]
struct CardState {
    rotation: f32,
    scale: f32,
    tilt: f32,
    lift: f32,
    opacity: f32,
    face: CardFace,
    front: Option<Arc<FaceContent>>,
    swap_angle: Option<f32>,
}

impl CardState {
    fn initial() -> Self {
        Self {
            rotation: 0.0,
            scale: 0.0,
            tilt: 0.0,
            lift: 0.0,
            opacity: 1.0,
            face: CardFace::Back,
            front: None,
            swap_angle: None,
        }
    }

    fn frame(&self) -> CardFrame {
        CardFrame {
            scale: self.scale,
            rotation_deg: self.rotation,
            tilt_deg: self.tilt,
            lift: self.lift,
            opacity: self.opacity,
            face: self.face.clone(),
        }
    }

    /// Advance the rotation. When the step crosses the swap checkpoint,
    /// returns the frame pinned exactly at the checkpoint.
    fn turn_to(&mut self, target: f32, front: &Arc<FaceContent>) -> Option<CardFrame> {
        let mut checkpoint = None;
        if self.swap_angle.is_none()
            && self.rotation < CardMotion::SWAP_ANGLE_DEG
            && target >= CardMotion::SWAP_ANGLE_DEG
        {
            self.rotation = CardMotion::SWAP_ANGLE_DEG;
            self.face = CardFace::Front(front.clone());
            self.swap_angle = Some(CardMotion::SWAP_ANGLE_DEG);
            checkpoint = Some(self.frame());
        }
        self.rotation = self.rotation.max(target);
        checkpoint
    }
}

#[derive(Debug, Clone, Copy)]
struct Setup {
    clock: FrameClock,
    surface: Option<SurfaceId>,
}

pub struct CardRevealUnit {
    renderer: Option<Arc<dyn RenderBackend>>,
    composer: Arc<dyn FaceComposer>,
    lifecycle: Lifecycle,
    gate: PlaybackGate,
    setup: Option<Setup>,
    state: Mutex<CardState>,
}

impl CardRevealUnit {
    pub fn new(renderer: Option<Arc<dyn RenderBackend>>, composer: Arc<dyn FaceComposer>) -> Self {
        Self {
            renderer,
            composer,
            lifecycle: Lifecycle::new(UnitKind::CardReveal),
            gate: PlaybackGate::new(),
            setup: None,
            state: Mutex::new(CardState::initial()),
        }
    }

    /// Rotation at which the front face replaced the back, once it has.
    pub fn swap_angle(&self) -> Option<f32> {
        self.lock().swap_angle
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn setup(&self) -> Result<Setup, UnitError> {
        self.lifecycle.ensure_prepared()?;
        self.setup.ok_or(UnitError::NotPrepared(UnitKind::CardReveal))
    }

    fn submit(&self, setup: Setup, frame: CardFrame) {
        if let (Some(renderer), Some(surface)) = (&self.renderer, setup.surface) {
            renderer.submit(surface, RenderFrame::Card(frame));
        }
    }

    fn front_face(&self, descriptor: &ProjectDescriptor) -> Arc<FaceContent> {
        if let Some(front) = self.lock().front.clone() {
            return front;
        }
        let front = compose_safely(self.composer.as_ref(), descriptor);
        self.lock().front = Some(front.clone());
        front
    }

    /// Run `step` once per frame until it reports completion or the gate
    /// closes. `step` receives elapsed animation seconds.
    async fn animate<F>(&self, setup: Setup, mut step: F)
    where
        F: FnMut(&mut CardState, f32) -> (Option<CardFrame>, bool) + Send,
    {
        let mut t = 0.0;
        loop {
            let (checkpoint, frame, done) = {
                let mut state = self.lock();
                let (checkpoint, done) = step(&mut state, t);
                (checkpoint, state.frame(), done)
            };
            if let Some(checkpoint) = checkpoint {
                self.submit(setup, checkpoint);
            }
            self.submit(setup, frame);
            if done {
                return;
            }
            match self.gate.frame(&setup.clock).await {
                Some(dt) => t += dt,
                None => return,
            }
        }
    }

    async fn reveal(&self, setup: Setup, params: &PhaseParams) {
        let front = self.front_face(&params.descriptor);
        let motion = CardMotion::new(params.duration_secs());
        self.animate(setup, |state, t| {
            state.scale = motion.scale_at(t);
            let checkpoint = state.turn_to(motion.rotation_at(t), &front);
            (checkpoint, motion.is_complete(t))
        })
        .await;
        debug!(swap_angle = ?self.swap_angle(), "Card revealed");
    }

    async fn settle(&self, setup: Setup, params: &PhaseParams) {
        let front = self.front_face(&params.descriptor);
        let (from_rotation, from_scale) = {
            let state = self.lock();
            (state.rotation, state.scale)
        };
        let span = params.duration_secs();
        self.animate(setup, |state, t| {
            let p = progress(t, 0.0, span);
            state.scale = lerp(from_scale, 1.0, p);
            let checkpoint = state.turn_to(
                lerp(from_rotation, CardMotion::TOTAL_SPIN_DEG, Ease::OutCubic.apply(p)),
                &front,
            );
            let damping = (1.0 - p) * (1.0 - p);
            state.tilt = if p >= 1.0 {
                0.0
            } else {
                WOBBLE_DEG * (std::f32::consts::TAU * WOBBLE_CYCLES * p).sin() * damping
            };
            (checkpoint, p >= 1.0)
        })
        .await;
    }

    async fn lift(&self, setup: Setup, params: &PhaseParams) {
        let from_scale = self.lock().scale;
        let span = params.duration_secs();
        self.animate(setup, |state, t| {
            let p = Ease::OutCubic.apply(progress(t, 0.0, span));
            state.lift = p;
            state.scale = lerp(from_scale, HANDOFF_SCALE, p);
            state.opacity = 1.0 - p;
            (None, t >= span)
        })
        .await;
        if !self.gate.is_cancelled() {
            self.clear_surface();
        }
    }

    fn clear_surface(&self) {
        if let (Some(renderer), Some(setup)) = (&self.renderer, self.setup) {
            if let Some(surface) = setup.surface {
                renderer.clear(surface);
            }
        }
    }
}

#[async_trait]
impl EffectUnit for CardRevealUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::CardReveal
    }

    fn phases(&self) -> Vec<PhaseName> {
        vec![PhaseName::Reveal, PhaseName::Settle, PhaseName::Handoff]
    }

    fn prepare(&mut self, config: &UnitConfig) -> Result<(), UnitError> {
        self.lifecycle.check_can_prepare()?;
        let segments = config.budget.card_segments;
        if segments == 0 {
            return Err(UnitError::Allocation(format!(
                "{} tier has no card segment budget",
                config.tier.as_str()
            )));
        }

        let surface = match self.renderer {
            Some(ref renderer) => Some(
                renderer
                    .allocate(SurfaceRequest {
                        unit: UnitKind::CardReveal,
                        primitives: segments,
                    })
                    .map_err(|e| UnitError::Allocation(e.to_string()))?,
            ),
            None => None,
        };

        self.setup = Some(Setup {
            clock: config.clock,
            surface,
        });
        *self.lock() = CardState::initial();
        self.gate.clear();
        self.lifecycle.mark_prepared();
        Ok(())
    }

    async fn play(&self, params: &PhaseParams) -> Result<(), UnitError> {
        let setup = self.setup()?;
        if self.gate.is_cancelled() {
            return Ok(());
        }
        match params.phase() {
            PhaseName::Reveal => self.reveal(setup, params).await,
            PhaseName::Settle => self.settle(setup, params).await,
            PhaseName::Handoff => self.lift(setup, params).await,
            _ => {}
        }
        Ok(())
    }

    fn cancel(&self) {
        self.gate.cancel();
        self.clear_surface();
    }

    fn reset(&self) {
        *self.lock() = CardState::initial();
        self.gate.clear();
    }

    fn dispose(&self) {
        self.gate.cancel();
        if !self.lifecycle.dispose() {
            return;
        }
        if let (Some(renderer), Some(setup)) = (&self.renderer, self.setup) {
            if let Some(surface) = setup.surface {
                renderer.release(surface);
            }
        }
    }
}
