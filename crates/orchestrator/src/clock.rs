//! Frame pacing for effect unit simulations.

use std::time::Duration;

/// Fixed-step frame source.
///
/// Each frame waits `frame_interval` of wall time and advances animation
/// time by `frame_interval * time_scale`. Coarser intervals model slow
/// devices; a time scale below 1.0 plays the animation in slow motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    frame_interval: Duration,
    time_scale: f32,
}

impl FrameClock {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            time_scale: 1.0,
        }
    }

    pub fn with_time_scale(mut self, time_scale: f32) -> Self {
        self.time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            1.0
        };
        self
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Animation seconds covered by one frame.
    pub fn step_secs(&self) -> f32 {
        self.frame_interval.as_secs_f32() * self.time_scale
    }

    /// Wait for the next frame and return its animation time step.
    pub async fn next_frame(&self) -> f32 {
        tokio::time::sleep(self.frame_interval).await;
        self.step_secs()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
