//! Summoning emblem: three counter-rotating rings, glyph markers, a
//! pulsing focal point.
//!
//! Ring rotation runs on its own task for the lifetime of a play cycle and
//! is the only writer of frames; `play` drives the scale-in, glyph
//! activation and fade-out by mutating shared state.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use summon_core::PhaseName;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::{EmblemFrame, RenderBackend, RenderFrame, SurfaceId, SurfaceRequest};
use crate::clock::FrameClock;
use crate::core::{EffectUnit, PhaseParams, UnitConfig, UnitKind};
use crate::easing::{lerp, progress, Ease};
use crate::error::UnitError;

use super::playback::{Lifecycle, PlaybackGate};

/// Outer, middle, inner angular velocity in degrees per second.
const RING_VELOCITIES: [f32; 3] = [-24.0, 12.0, -72.0];
const GLYPH_DELAY_SECS: f32 = 0.15;
const SCALE_IN_SECS: f32 = 0.6;
const PULSE_HZ: f32 = 1.2;
const FADE_OUT_SECS: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
struct EmblemState {
    ring_angles: [f32; 3],
    scale: f32,
    opacity: f32,
    active_glyphs: u32,
    pulse_phase: f32,
}

impl EmblemState {
    fn initial() -> Self {
        Self {
            ring_angles: [0.0; 3],
            scale: 0.0,
            opacity: 1.0,
            active_glyphs: 0,
            pulse_phase: 0.0,
        }
    }

    fn advance(&mut self, dt: f32) {
        for (angle, velocity) in self.ring_angles.iter_mut().zip(RING_VELOCITIES) {
            *angle = (*angle + velocity * dt).rem_euclid(360.0);
        }
        self.pulse_phase = (self.pulse_phase + PULSE_HZ * dt).fract();
    }

    fn frame(&self, glyph_count: u32) -> EmblemFrame {
        EmblemFrame {
            ring_angles_deg: self.ring_angles,
            scale: self.scale,
            opacity: self.opacity,
            active_glyphs: self.active_glyphs,
            glyph_count,
            focal_pulse: 0.5 - 0.5 * (self.pulse_phase * std::f32::consts::TAU).cos(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Setup {
    clock: FrameClock,
    surface: Option<SurfaceId>,
    glyph_count: u32,
}

pub struct EmblemUnit {
    renderer: Option<Arc<dyn RenderBackend>>,
    lifecycle: Lifecycle,
    gate: PlaybackGate,
    setup: Option<Setup>,
    state: Arc<Mutex<EmblemState>>,
    rotation: Mutex<Option<JoinHandle<()>>>,
}

impl EmblemUnit {
    pub fn new(renderer: Option<Arc<dyn RenderBackend>>) -> Self {
        Self {
            renderer,
            lifecycle: Lifecycle::new(UnitKind::Emblem),
            gate: PlaybackGate::new(),
            setup: None,
            state: Arc::new(Mutex::new(EmblemState::initial())),
            rotation: Mutex::new(None),
        }
    }

    fn setup(&self) -> Result<Setup, UnitError> {
        self.lifecycle.ensure_prepared()?;
        self.setup.ok_or(UnitError::NotPrepared(UnitKind::Emblem))
    }

    fn update<R>(&self, f: impl FnOnce(&mut EmblemState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn start_rotation(&self, setup: Setup) {
        let mut rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);
        if rotation.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let state = self.state.clone();
        let renderer = self.renderer.clone();
        *rotation = Some(tokio::spawn(async move {
            loop {
                let dt = setup.clock.next_frame().await;
                let frame = {
                    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                    state.advance(dt);
                    state.frame(setup.glyph_count)
                };
                if let (Some(renderer), Some(surface)) = (&renderer, setup.surface) {
                    renderer.submit(surface, RenderFrame::Emblem(frame));
                }
            }
        }));
    }

    fn stop_rotation(&self) {
        let task = self
            .rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }

    fn clear_surface(&self) {
        if let (Some(renderer), Some(setup)) = (&self.renderer, self.setup) {
            if let Some(surface) = setup.surface {
                renderer.clear(surface);
            }
        }
    }

    async fn summon(&self, setup: Setup) {
        self.start_rotation(setup);
        let mut t = 0.0;
        loop {
            let done = self.update(|state| {
                state.scale = Ease::OutBack.apply(progress(t, 0.0, SCALE_IN_SECS));
                state.active_glyphs =
                    ((t / GLYPH_DELAY_SECS) as u32 + 1).min(setup.glyph_count);
                t >= SCALE_IN_SECS && state.active_glyphs == setup.glyph_count
            });
            if done {
                break;
            }
            match self.gate.frame(&setup.clock).await {
                Some(dt) => t += dt,
                None => return,
            }
        }
        debug!(glyphs = setup.glyph_count, "Emblem summoned");
    }

    async fn fade_out(&self, setup: Setup, params: &PhaseParams) {
        self.start_rotation(setup);
        let from = self.update(|state| state.opacity);
        let span = FADE_OUT_SECS.min(params.duration_secs());
        let mut t = 0.0;
        loop {
            let done = self.update(|state| {
                state.opacity = lerp(from, 0.0, Ease::OutQuad.apply(progress(t, 0.0, span)));
                t >= span
            });
            if done {
                break;
            }
            match self.gate.frame(&setup.clock).await {
                Some(dt) => t += dt,
                None => return,
            }
        }
        self.stop_rotation();
        self.clear_surface();
    }
}

#[async_trait]
impl EffectUnit for EmblemUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Emblem
    }

    fn phases(&self) -> Vec<PhaseName> {
        vec![PhaseName::Emblem, PhaseName::Handoff]
    }

    fn prepare(&mut self, config: &UnitConfig) -> Result<(), UnitError> {
        self.lifecycle.check_can_prepare()?;
        let glyph_count = config.budget.glyphs;
        if glyph_count == 0 {
            return Err(UnitError::Allocation(format!(
                "{} tier has no glyph budget",
                config.tier.as_str()
            )));
        }

        let surface = match self.renderer {
            Some(ref renderer) => Some(
                renderer
                    .allocate(SurfaceRequest {
                        unit: UnitKind::Emblem,
                        primitives: 3 + glyph_count,
                    })
                    .map_err(|e| UnitError::Allocation(e.to_string()))?,
            ),
            None => None,
        };

        self.setup = Some(Setup {
            clock: config.clock,
            surface,
            glyph_count,
        });
        self.update(|state| *state = EmblemState::initial());
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
            PhaseName::Emblem => self.summon(setup).await,
            PhaseName::Handoff => self.fade_out(setup, params).await,
            _ => {}
        }
        Ok(())
    }

    fn cancel(&self) {
        self.gate.cancel();
        self.stop_rotation();
        self.clear_surface();
    }

    fn reset(&self) {
        self.stop_rotation();
        self.update(|state| *state = EmblemState::initial());
        self.gate.clear();
    }

    fn dispose(&self) {
        self.gate.cancel();
        self.stop_rotation();
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

impl Drop for EmblemUnit {
    fn drop(&mut self) {
        self.stop_rotation();
    }
}
