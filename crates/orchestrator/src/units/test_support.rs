//! Recording back ends for unit tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use summon_core::{PerformanceTier, PhaseName, PhaseSpec, ProjectDescriptor, RarityTier, TierBudget};

use crate::backend::{
    AudioBackend, AudioError, RenderBackend, RenderError, RenderFrame, SurfaceId, SurfaceRequest,
    ToneClip,
};
use crate::clock::FrameClock;
use crate::core::{PhaseParams, UnitConfig};

#[derive(Default)]
pub struct RecordingRenderer {
    next_id: AtomicU64,
    pub requests: Mutex<Vec<SurfaceRequest>>,
    pub frames: Mutex<Vec<RenderFrame>>,
    pub cleared: Mutex<Vec<SurfaceId>>,
    pub released: Mutex<Vec<SurfaceId>>,
    pub fail_with: Option<RenderError>,
}

impl RecordingRenderer {
    pub fn failing(error: RenderError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn frames(&self) -> Vec<RenderFrame> {
        self.frames.lock().unwrap().clone()
    }
}

impl RenderBackend for RecordingRenderer {
    fn allocate(&self, request: SurfaceRequest) -> Result<SurfaceId, RenderError> {
        if let Some(ref error) = self.fail_with {
            return Err(error.clone());
        }
        self.requests.lock().unwrap().push(request);
        Ok(SurfaceId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn submit(&self, _surface: SurfaceId, frame: RenderFrame) {
        self.frames.lock().unwrap().push(frame);
    }

    fn clear(&self, surface: SurfaceId) {
        self.cleared.lock().unwrap().push(surface);
    }

    fn release(&self, surface: SurfaceId) {
        self.released.lock().unwrap().push(surface);
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    pub deny: bool,
    pub opened: Mutex<Option<u32>>,
    pub clips: Mutex<Vec<ToneClip>>,
    pub stops: AtomicU64,
    pub closes: AtomicU64,
}

impl AudioBackend for RecordingAudio {
    fn open(&self, voices: u32) -> Result<(), AudioError> {
        if self.deny {
            return Err(AudioError::PermissionDenied);
        }
        *self.opened.lock().unwrap() = Some(voices);
        Ok(())
    }

    fn play(&self, clip: ToneClip) {
        self.clips.lock().unwrap().push(clip);
    }

    fn stop_all(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn descriptor(rarity: RarityTier) -> Arc<ProjectDescriptor> {
    Arc::new(
        ProjectDescriptor::new("atlas", "Atlas")
            .with_rarity(rarity)
            .with_category("Tooling")
            .with_importance(4.0),
    )
}

pub fn config(tier: PerformanceTier, clock: FrameClock) -> UnitConfig {
    UnitConfig {
        tier,
        budget: TierBudget::for_tier(tier),
        clock,
        descriptor: descriptor(RarityTier::Common),
        seed: 7,
    }
}

pub fn params(name: PhaseName, duration_ms: u64, rarity: RarityTier) -> PhaseParams {
    PhaseParams::new(PhaseSpec::new(name, 0, duration_ms), descriptor(rarity))
}
