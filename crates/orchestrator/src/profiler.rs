//! Device classification into performance tiers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use summon_core::PerformanceTier;
use tracing::debug;

/// Screens narrower than this count as "small" for touch devices.
const SMALL_SCREEN_WIDTH: u32 = 768;
const LOW_MEMORY_GB: f32 = 2.0;
const HIGH_MEMORY_GB: f32 = 4.0;
const LOW_CORES: u32 = 2;
const HIGH_CORES: u32 = 4;

/// Coarse environment signals. `None` means the host could not tell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceSignals {
    pub coarse_pointer: bool,
    pub max_touch_points: u32,
    pub device_memory_gb: Option<f32>,
    pub hardware_concurrency: Option<u32>,
    pub screen_width: Option<u32>,
    pub prefers_reduced_motion: bool,
}

impl DeviceSignals {
    /// A capable desktop: fine pointer, plenty of memory and cores.
    pub fn desktop() -> Self {
        Self {
            coarse_pointer: false,
            max_touch_points: 0,
            device_memory_gb: Some(8.0),
            hardware_concurrency: Some(8),
            screen_width: Some(1920),
            prefers_reduced_motion: false,
        }
    }

    pub fn is_small_touch_screen(&self) -> bool {
        let touch = self.coarse_pointer || self.max_touch_points > 0;
        touch && self.screen_width.is_some_and(|w| w < SMALL_SCREEN_WIDTH)
    }
}

/// Source of environment signals, queried once per classification.
pub trait EnvironmentProbe: Send + Sync {
    fn signals(&self) -> DeviceSignals;
}

impl EnvironmentProbe for DeviceSignals {
    fn signals(&self) -> DeviceSignals {
        *self
    }
}

/// Classifies the runtime environment into a [`PerformanceTier`].
#[derive(Clone)]
pub struct DeviceProfiler {
    probe: Arc<dyn EnvironmentProbe>,
}

impl DeviceProfiler {
    pub fn new(probe: Arc<dyn EnvironmentProbe>) -> Self {
        Self { probe }
    }

    /// Profiler over a fixed set of signals.
    pub fn fixed(signals: DeviceSignals) -> Self {
        Self::new(Arc::new(signals))
    }

    pub fn classify(&self) -> PerformanceTier {
        let signals = self.probe.signals();
        let tier = classify_signals(&signals);
        debug!(?signals, tier = tier.as_str(), "Device classified");
        tier
    }
}

impl Default for DeviceProfiler {
    fn default() -> Self {
        Self::fixed(DeviceSignals::default())
    }
}

impl std::fmt::Debug for DeviceProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceProfiler").finish_non_exhaustive()
    }
}

/// Pure tier decision; unknown or ambiguous signals land on `Reduced`.
pub fn classify_signals(signals: &DeviceSignals) -> PerformanceTier {
    if signals.prefers_reduced_motion {
        return PerformanceTier::Minimal;
    }

    let memory = signals.device_memory_gb.filter(|m| m.is_finite() && *m > 0.0);
    let cores = signals.hardware_concurrency.filter(|c| *c > 0);

    if memory.is_none() && cores.is_none() {
        return PerformanceTier::Reduced;
    }

    if memory.is_some_and(|m| m < LOW_MEMORY_GB) || cores.is_some_and(|c| c < LOW_CORES) {
        return PerformanceTier::Minimal;
    }

    let roomy = memory.map_or(true, |m| m >= HIGH_MEMORY_GB);
    let parallel = cores.map_or(true, |c| c >= HIGH_CORES);
    if roomy && parallel && !signals.is_small_touch_screen() {
        return PerformanceTier::Full;
    }

    PerformanceTier::Reduced
}
