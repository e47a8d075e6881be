//! Particle field: an inward ring flow while energy gathers, then a
//! spherical burst that decays to nothing.

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use summon_core::{PhaseName, TierBudget};
use tracing::debug;

use crate::backend::{ParticleFrame, ParticleMode, ParticleSprite, RenderBackend, RenderFrame, SurfaceId, SurfaceRequest};
use crate::clock::FrameClock;
use crate::core::{EffectUnit, PhaseParams, UnitConfig, UnitKind};
use crate::error::UnitError;

use super::playback::{Lifecycle, PlaybackGate};

const RING_INNER: f32 = 0.6;
const RING_OUTER: f32 = 1.2;
/// Radial drift toward the focal point, units per second
const RING_INWARD_SPEED: f32 = 0.25;
const RING_SPEED: std::ops::Range<f32> = 0.8..1.6;

const BURST_SPEED: std::ops::Range<f32> = 2.0..4.0;
/// Velocity decay constant `k` in `v *= exp(-k dt)`
const BURST_DRAG: f32 = 3.0;
const FADE_FLOOR: f32 = 0.05;
/// Largest rarity multiplier; surfaces are sized for it up front
const MAX_INTENSITY: f32 = 1.5;

#[derive(Debug, Clone, Copy)]
struct RingParticle {
    angle: f32,
    radius: f32,
    speed: f32,
}

/// Particles advected around the emblem ring, spiralling inward.
#[derive(Debug, Default)]
pub(crate) struct RingFlowSim {
    particles: Vec<RingParticle>,
}

impl RingFlowSim {
    fn spawn_one(rng: &mut StdRng) -> RingParticle {
        RingParticle {
            angle: rng.random_range(0.0..TAU),
            radius: rng.random_range(RING_INNER..RING_OUTER),
            speed: rng.random_range(RING_SPEED),
        }
    }

    pub(crate) fn spawn(&mut self, count: u32, rng: &mut StdRng) {
        self.particles = (0..count).map(|_| Self::spawn_one(rng)).collect();
    }

    pub(crate) fn step(&mut self, dt: f32, rng: &mut StdRng) {
        for particle in &mut self.particles {
            particle.angle = (particle.angle + particle.speed / particle.radius * dt).rem_euclid(TAU);
            particle.radius -= RING_INWARD_SPEED * dt;
            if particle.radius < RING_INNER {
                particle.radius = RING_OUTER;
                particle.angle = rng.random_range(0.0..TAU);
            }
        }
    }

    pub(crate) fn sprites(&self) -> Vec<ParticleSprite> {
        self.particles
            .iter()
            .map(|p| ParticleSprite {
                position: [p.radius * p.angle.cos(), p.radius * p.angle.sin(), 0.0],
                // Brighter toward the focal point
                opacity: 1.0 - (p.radius - RING_INNER) / (RING_OUTER - RING_INNER),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.particles.len()
    }

    pub(crate) fn clear(&mut self) {
        self.particles.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct BurstParticle {
    position: [f32; 3],
    velocity: [f32; 3],
    initial_speed: f32,
}

impl BurstParticle {
    fn speed(&self) -> f32 {
        self.velocity.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn opacity(&self) -> f32 {
        if self.initial_speed > 0.0 {
            self.speed() / self.initial_speed
        } else {
            0.0
        }
    }
}

/// Radial burst from the focal point.
#[derive(Debug, Default)]
pub(crate) struct BurstSim {
    particles: Vec<BurstParticle>,
}

impl BurstSim {
    /// Launch `count` particles uniformly over the unit sphere.
    pub(crate) fn launch(&mut self, count: u32, rng: &mut StdRng) {
        self.particles = (0..count)
            .map(|_| {
                let z: f32 = rng.random_range(-1.0..1.0);
                let phi: f32 = rng.random_range(0.0..TAU);
                let r = (1.0 - z * z).sqrt();
                let speed = rng.random_range(BURST_SPEED);
                BurstParticle {
                    position: [0.0; 3],
                    velocity: [r * phi.cos() * speed, r * phi.sin() * speed, z * speed],
                    initial_speed: speed,
                }
            })
            .collect();
    }

    pub(crate) fn step(&mut self, dt: f32) {
        let decay = (-BURST_DRAG * dt).exp();
        for particle in &mut self.particles {
            for axis in 0..3 {
                particle.position[axis] += particle.velocity[axis] * dt;
                particle.velocity[axis] *= decay;
            }
        }
    }

    pub(crate) fn is_faded(&self) -> bool {
        self.particles.iter().all(|p| p.opacity() < FADE_FLOOR)
    }

    pub(crate) fn sprites(&self) -> Vec<ParticleSprite> {
        self.particles
            .iter()
            .map(|p| ParticleSprite {
                position: p.position,
                opacity: p.opacity(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.particles.len()
    }

    pub(crate) fn clear(&mut self) {
        self.particles.clear();
    }
}

struct Field {
    ring: RingFlowSim,
    burst: BurstSim,
    mode: Option<ParticleMode>,
    rng: StdRng,
}

impl Field {
    fn new(seed: u64) -> Self {
        Self {
            ring: RingFlowSim::default(),
            burst: BurstSim::default(),
            mode: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Switch modes; the inactive simulation is emptied.
    fn enter(&mut self, mode: ParticleMode) {
        self.mode = Some(mode);
        match mode {
            ParticleMode::RingFlow => self.burst.clear(),
            ParticleMode::Burst => self.ring.clear(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Setup {
    clock: FrameClock,
    surface: Option<SurfaceId>,
    budget: TierBudget,
}

pub struct ParticleUnit {
    renderer: Option<Arc<dyn RenderBackend>>,
    lifecycle: Lifecycle,
    gate: PlaybackGate,
    setup: Option<Setup>,
    field: Mutex<Field>,
}

impl ParticleUnit {
    pub fn new(renderer: Option<Arc<dyn RenderBackend>>) -> Self {
        Self {
            renderer,
            lifecycle: Lifecycle::new(UnitKind::Particle),
            gate: PlaybackGate::new(),
            setup: None,
            field: Mutex::new(Field::new(0)),
        }
    }

    pub fn mode(&self) -> Option<ParticleMode> {
        self.lock().mode
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Field> {
        self.field.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn setup(&self) -> Result<Setup, UnitError> {
        self.lifecycle.ensure_prepared()?;
        self.setup.ok_or(UnitError::NotPrepared(UnitKind::Particle))
    }

    fn submit(&self, setup: Setup, frame: ParticleFrame) {
        if let (Some(renderer), Some(surface)) = (&self.renderer, setup.surface) {
            renderer.submit(surface, RenderFrame::Particles(frame));
        }
    }

    fn clear_surface(&self) {
        if let (Some(renderer), Some(setup)) = (&self.renderer, self.setup) {
            if let Some(surface) = setup.surface {
                renderer.clear(surface);
            }
        }
    }

    async fn ring_flow(&self, setup: Setup, params: &PhaseParams) {
        let color_rgb = params.descriptor.rarity.accent_rgb();
        {
            let mut field = self.lock();
            field.enter(ParticleMode::RingFlow);
            let Field { ring, rng, .. } = &mut *field;
            ring.spawn(setup.budget.ring_particles, rng);
        }

        let span = params.duration_secs();
        let mut t = 0.0;
        while t < span {
            let Some(dt) = self.gate.frame(&setup.clock).await else {
                return;
            };
            t += dt;
            let sprites = {
                let mut field = self.lock();
                let Field { ring, rng, .. } = &mut *field;
                ring.step(dt, rng);
                ring.sprites()
            };
            self.submit(
                setup,
                ParticleFrame {
                    mode: ParticleMode::RingFlow,
                    color_rgb,
                    sprites,
                },
            );
        }
    }

    async fn burst(&self, setup: Setup, params: &PhaseParams) {
        let color_rgb = params.descriptor.rarity.accent_rgb();
        let count = (setup.budget.burst_particles as f32 * params.intensity).round() as u32;
        {
            let mut field = self.lock();
            field.enter(ParticleMode::Burst);
            let Field { burst, rng, .. } = &mut *field;
            burst.launch(count, rng);
        }
        debug!(particles = count, rarity = params.descriptor.rarity.as_str(), "Burst launched");

        loop {
            let Some(dt) = self.gate.frame(&setup.clock).await else {
                return;
            };
            let (sprites, faded) = {
                let mut field = self.lock();
                field.burst.step(dt);
                (field.burst.sprites(), field.burst.is_faded())
            };
            self.submit(
                setup,
                ParticleFrame {
                    mode: ParticleMode::Burst,
                    color_rgb,
                    sprites,
                },
            );
            if faded {
                break;
            }
        }
        self.lock().burst.clear();
        self.clear_surface();
    }
}

#[async_trait]
impl EffectUnit for ParticleUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Particle
    }

    fn phases(&self) -> Vec<PhaseName> {
        match self.setup {
            Some(setup) if setup.budget.ring_flow => vec![PhaseName::EnergyGather, PhaseName::Burst],
            _ => vec![PhaseName::Burst],
        }
    }

    fn prepare(&mut self, config: &UnitConfig) -> Result<(), UnitError> {
        self.lifecycle.check_can_prepare()?;
        let budget = config.budget;
        let ring = if budget.ring_flow { budget.ring_particles } else { 0 };
        let burst = (budget.burst_particles as f32 * MAX_INTENSITY).ceil() as u32;
        if ring == 0 && burst == 0 {
            return Err(UnitError::Allocation(format!(
                "{} tier has no particle budget",
                config.tier.as_str()
            )));
        }

        let surface = match self.renderer {
            Some(ref renderer) => Some(
                renderer
                    .allocate(SurfaceRequest {
                        unit: UnitKind::Particle,
                        primitives: ring.max(burst),
                    })
                    .map_err(|e| UnitError::Allocation(e.to_string()))?,
            ),
            None => None,
        };

        self.setup = Some(Setup {
            clock: config.clock,
            surface,
            budget,
        });
        *self.lock() = Field::new(config.seed);
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
            PhaseName::EnergyGather if setup.budget.ring_flow => self.ring_flow(setup, params).await,
            PhaseName::Burst => self.burst(setup, params).await,
            _ => {}
        }
        Ok(())
    }

    fn cancel(&self) {
        self.gate.cancel();
        self.clear_surface();
    }

    fn reset(&self) {
        {
            let mut field = self.lock();
            field.ring.clear();
            field.burst.clear();
            field.mode = None;
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderError;
    use crate::units::test_support::{config, params, RecordingRenderer};
    use std::time::Duration;
    use summon_core::{PerformanceTier, RarityTier};
    use tokio::time::Instant;

    fn particle_frames(renderer: &RecordingRenderer) -> Vec<ParticleFrame> {
        renderer
            .frames()
            .into_iter()
            .filter_map(|frame| match frame {
                RenderFrame::Particles(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn prepared(renderer: &Arc<RecordingRenderer>, tier: PerformanceTier) -> ParticleUnit {
        let mut unit = ParticleUnit::new(Some(renderer.clone() as Arc<dyn RenderBackend>));
        unit.prepare(&config(tier, FrameClock::default())).unwrap();
        unit
    }

    #[test]
    fn test_burst_directions_cover_sphere() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut sim = BurstSim::default();
        sim.launch(2000, &mut rng);

        let mut upper = 0;
        for particle in &sim.particles {
            assert!((particle.speed() - particle.initial_speed).abs() < 1e-4);
            if particle.velocity[2] > 0.0 {
                upper += 1;
            }
        }
        // Uniform in z means roughly half the particles head upward
        assert!((800..1200).contains(&upper));
    }

    #[test]
    fn test_burst_decay_is_exponential() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sim = BurstSim::default();
        sim.launch(10, &mut rng);

        sim.step(0.5);
        let expected = (-BURST_DRAG * 0.5).exp();
        for sprite in sim.sprites() {
            assert!((sprite.opacity - expected).abs() < 1e-4);
        }
        assert!(!sim.is_faded());

        sim.step(0.6);
        assert!(sim.is_faded());
    }

    #[test]
    fn test_ring_flow_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sim = RingFlowSim::default();
        sim.spawn(300, &mut rng);
        for _ in 0..500 {
            sim.step(0.016, &mut rng);
        }
        assert_eq!(sim.len(), 300);
        for sprite in sim.sprites() {
            let r = sprite.position[0].hypot(sprite.position[1]);
            assert!(r >= RING_INNER - 1e-3 && r <= RING_OUTER + 1e-3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_count_scales_with_rarity() {
        for (tier, rarity, expected) in [
            (PerformanceTier::Full, RarityTier::Legendary, 600),
            (PerformanceTier::Full, RarityTier::Rare, 460),
            (PerformanceTier::Reduced, RarityTier::Common, 120),
        ] {
            let renderer = Arc::new(RecordingRenderer::default());
            let unit = prepared(&renderer, tier);
            unit.play(&params(PhaseName::Burst, 1000, rarity)).await.unwrap();

            let frames = particle_frames(&renderer);
            assert_eq!(frames[0].sprites.len(), expected);
            assert_eq!(frames[0].color_rgb, rarity.accent_rgb());
            assert!(frames.iter().all(|f| f.mode == ParticleMode::Burst));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_resolves_once_faded() {
        let renderer = Arc::new(RecordingRenderer::default());
        let unit = prepared(&renderer, PerformanceTier::Full);

        let start = Instant::now();
        unit.play(&params(PhaseName::Burst, 1000, RarityTier::Common))
            .await
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(990) && elapsed <= Duration::from_millis(1100));

        let last = particle_frames(&renderer).pop().unwrap();
        assert!(last.sprites.iter().all(|s| s.opacity < FADE_FLOOR));
        assert_eq!(renderer.cleared.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mode_switch_discards_ring() {
        let renderer = Arc::new(RecordingRenderer::default());
        let unit = prepared(&renderer, PerformanceTier::Full);
        assert!(unit.participates_in(PhaseName::EnergyGather));

        unit.play(&params(PhaseName::EnergyGather, 300, RarityTier::Common))
            .await
            .unwrap();
        assert_eq!(unit.mode(), Some(ParticleMode::RingFlow));
        let ring_frames = particle_frames(&renderer);
        assert!(ring_frames.iter().all(|f| f.sprites.len() == 600));

        unit.play(&params(PhaseName::Burst, 1000, RarityTier::Common))
            .await
            .unwrap();
        assert_eq!(unit.mode(), Some(ParticleMode::Burst));
        assert_eq!(unit.lock().ring.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reduced_tier_skips_ring_flow() {
        let renderer = Arc::new(RecordingRenderer::default());
        let unit = prepared(&renderer, PerformanceTier::Reduced);
        assert!(!unit.participates_in(PhaseName::EnergyGather));

        let start = Instant::now();
        unit.play(&params(PhaseName::EnergyGather, 1500, RarityTier::Common))
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(renderer.frame_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_frames() {
        let run = || async {
            let renderer = Arc::new(RecordingRenderer::default());
            let unit = prepared(&renderer, PerformanceTier::Reduced);
            unit.play(&params(PhaseName::Burst, 1000, RarityTier::Epic))
                .await
                .unwrap();
            particle_frames(&renderer)
        };
        assert_eq!(run().await, run().await);
    }

    #[test]
    fn test_context_loss_fails_prepare() {
        let renderer = Arc::new(RecordingRenderer::failing(RenderError::ContextLost));
        let mut unit = ParticleUnit::new(Some(renderer as Arc<dyn RenderBackend>));
        let err = unit
            .prepare(&config(PerformanceTier::Full, FrameClock::default()))
            .unwrap_err();
        assert_eq!(err, UnitError::Allocation("rendering context lost".into()));
    }
}
