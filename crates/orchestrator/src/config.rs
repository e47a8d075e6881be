use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use summon_core::{PerformanceTier, TierBudgets};
use tokio::fs;
use tracing::{debug, warn};

use crate::clock::FrameClock;
use crate::error::Result;
use crate::sequencer::SequenceConfig;
use crate::skip::DEFAULT_SKIP_KEYS;
use crate::timeline::PhaseTimeline;

/// Slack added on top of the sequence ceiling before the watchdog fires.
const WATCHDOG_SLACK_MS: u64 = 1000;

/// Engine configuration, usually loaded from a JSON file.
///
/// Every field has a default, so a partial file only overrides what it
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub timeline: PhaseTimeline,
    /// Multiplier applied to phase and sequence durations to get hard ceilings
    pub ceiling_factor: f64,
    /// Explicit watchdog; derived from the timeline when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchdog_ms: Option<u64>,
    pub frame_interval_ms: u64,
    pub time_scale: f32,
    pub skip_keys: Vec<String>,
    /// Bypass device classification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_tier: Option<PerformanceTier>,
    pub budgets: TierBudgets,
    pub particle_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeline: PhaseTimeline::default(),
            ceiling_factor: 1.5,
            watchdog_ms: None,
            frame_interval_ms: 16,
            time_scale: 1.0,
            skip_keys: DEFAULT_SKIP_KEYS.iter().map(|k| k.to_string()).collect(),
            force_tier: None,
            budgets: TierBudgets::default(),
            particle_seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    /// Read config from a JSON file, falling back to defaults.
    pub async fn read(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write config as pretty JSON, creating the parent directory.
    pub async fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).await?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        debug!(path = %path.display(), "Config saved successfully");

        Ok(())
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Watchdog deadline for one presentation.
    pub fn watchdog(&self) -> Duration {
        let ms = self.watchdog_ms.unwrap_or_else(|| {
            self.timeline
                .hard_ceiling_ms(self.ceiling_factor)
                .saturating_add(WATCHDOG_SLACK_MS)
        });
        Duration::from_millis(ms)
    }

    pub fn clock(&self) -> FrameClock {
        FrameClock::new(Duration::from_millis(self.frame_interval_ms))
            .with_time_scale(self.time_scale)
    }

    pub fn sequence_config(&self) -> SequenceConfig {
        SequenceConfig {
            timeline: self.timeline.clone(),
            ceiling_factor: self.ceiling_factor,
            budgets: self.budgets,
            clock: self.clock(),
            seed: self.particle_seed,
        }
    }
}
