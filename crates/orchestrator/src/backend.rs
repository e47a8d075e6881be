//! Rendering and audio capabilities injected into the effect units.
//!
//! The engine never reaches for ambient globals: whatever draws pixels or
//! plays samples is handed in through [`Capabilities`]. Either capability
//! may be absent; visual units then simulate headlessly and the sound unit
//! becomes a no-op.

use std::sync::Arc;
use std::time::Duration;

use summon_core::{PhaseName, RarityTier};
use thiserror::Error;

use crate::core::UnitKind;

/// Handle to a surface allocated by the render back end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// What a unit asks the renderer to reserve during prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRequest {
    pub unit: UnitKind,
    /// Sprites, polygons or glyphs, depending on the unit
    pub primitives: u32,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("rendering context lost")]
    ContextLost,

    #[error("requested {requested} primitives, only {available} available")]
    BudgetExceeded { requested: u32, available: u32 },

    #[error("render back end error: {0}")]
    Backend(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    #[error("audio permission not granted")]
    PermissionDenied,

    #[error("audio unavailable: {0}")]
    Unavailable(String),
}

/// Snapshot of the emblem for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmblemFrame {
    /// Outer, middle and inner ring angles in degrees (positive is clockwise)
    pub ring_angles_deg: [f32; 3],
    pub scale: f32,
    pub opacity: f32,
    pub active_glyphs: u32,
    pub glyph_count: u32,
    /// Focal point pulse, 0.0..=1.0
    pub focal_pulse: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleMode {
    RingFlow,
    Burst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSprite {
    pub position: [f32; 3],
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFrame {
    pub mode: ParticleMode,
    pub color_rgb: u32,
    pub sprites: Vec<ParticleSprite>,
}

/// Content shown on the card's front face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceContent {
    pub title: String,
    pub subtitle: String,
    pub rarity: RarityTier,
    pub accent_rgb: u32,
    /// 0..=5
    pub stars: u8,
    pub summary: Option<String>,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardFace {
    Back,
    Front(Arc<FaceContent>),
}

impl CardFace {
    pub fn is_front(&self) -> bool {
        matches!(self, Self::Front(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardFrame {
    pub scale: f32,
    /// Accumulated rotation about the vertical axis, in degrees
    pub rotation_deg: f32,
    /// Small settling wobble about the horizontal axis
    pub tilt_deg: f32,
    /// 0.0 in place, 1.0 fully lifted toward the detail view
    pub lift: f32,
    pub opacity: f32,
    pub face: CardFace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderFrame {
    Emblem(EmblemFrame),
    Particles(ParticleFrame),
    Card(CardFrame),
}

impl RenderFrame {
    pub fn unit(&self) -> UnitKind {
        match self {
            Self::Emblem(_) => UnitKind::Emblem,
            Self::Particles(_) => UnitKind::Particle,
            Self::Card(_) => UnitKind::CardReveal,
        }
    }
}

/// Drawing back end shared by the visual units.
pub trait RenderBackend: Send + Sync {
    fn allocate(&self, request: SurfaceRequest) -> Result<SurfaceId, RenderError>;

    fn submit(&self, surface: SurfaceId, frame: RenderFrame);

    /// Blank the surface without releasing it.
    fn clear(&self, surface: SurfaceId);

    fn release(&self, surface: SurfaceId);
}

/// One synthesized clip, mono.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneClip {
    pub phase: PhaseName,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl ToneClip {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Audio output. `open` may fail when the user never granted permission.
pub trait AudioBackend: Send + Sync {
    fn open(&self, voices: u32) -> Result<(), AudioError>;

    fn play(&self, clip: ToneClip);

    fn stop_all(&self);

    fn close(&self);
}

/// Back ends available to one invocation.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub renderer: Option<Arc<dyn RenderBackend>>,
    pub audio: Option<Arc<dyn AudioBackend>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RenderBackend>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioBackend>) -> Self {
        self.audio = Some(audio);
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("renderer", &self.renderer.is_some())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}
