//! Per-phase audio cues.
//!
//! Audio is strictly optional: a missing back end or a refused permission
//! turns the unit into a silent no-op instead of failing setup.

use std::sync::Arc;

use async_trait::async_trait;
use summon_core::PhaseName;
use tracing::{debug, warn};

use crate::backend::{AudioBackend, ToneClip};
use crate::core::{EffectUnit, PhaseParams, UnitConfig, UnitKind};
use crate::error::UnitError;

use super::playback::{Lifecycle, PlaybackGate};
use super::synth::{recipe_for, render, SAMPLE_RATE};

#[derive(Debug, Clone, Copy)]
struct Setup {
    voices: u32,
    enabled: bool,
}

pub struct SoundUnit {
    audio: Option<Arc<dyn AudioBackend>>,
    lifecycle: Lifecycle,
    gate: PlaybackGate,
    setup: Option<Setup>,
}

impl SoundUnit {
    pub fn new(audio: Option<Arc<dyn AudioBackend>>) -> Self {
        Self {
            audio,
            lifecycle: Lifecycle::new(UnitKind::Sound),
            gate: PlaybackGate::new(),
            setup: None,
        }
    }

    /// Whether cues actually reach an audio back end.
    pub fn is_audible(&self) -> bool {
        self.setup.is_some_and(|setup| setup.enabled)
    }

    fn backend(&self) -> Option<&Arc<dyn AudioBackend>> {
        self.audio.as_ref().filter(|_| self.is_audible())
    }
}

#[async_trait]
impl EffectUnit for SoundUnit {
    fn kind(&self) -> UnitKind {
        UnitKind::Sound
    }

    fn phases(&self) -> Vec<PhaseName> {
        PhaseName::ALL.to_vec()
    }

    fn prepare(&mut self, config: &UnitConfig) -> Result<(), UnitError> {
        self.lifecycle.check_can_prepare()?;
        let voices = config.budget.voices.max(1);

        let enabled = match self.audio {
            Some(ref audio) => match audio.open(voices) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Audio unavailable, sound unit will stay silent");
                    false
                }
            },
            None => {
                debug!("No audio back end, sound unit will stay silent");
                false
            }
        };

        self.setup = Some(Setup { voices, enabled });
        self.gate.clear();
        self.lifecycle.mark_prepared();
        Ok(())
    }

    async fn play(&self, params: &PhaseParams) -> Result<(), UnitError> {
        self.lifecycle.ensure_prepared()?;
        let (Some(setup), Some(audio)) = (self.setup, self.backend()) else {
            return Ok(());
        };
        if self.gate.is_cancelled() {
            return Ok(());
        }

        let recipe = recipe_for(params.phase(), params.descriptor.rarity, setup.voices);
        let clip = ToneClip {
            phase: params.phase(),
            sample_rate: SAMPLE_RATE,
            samples: render(&recipe, SAMPLE_RATE),
        };
        let wait = clip.duration().min(params.duration());
        audio.play(clip);
        self.gate.sleep(wait).await;
        Ok(())
    }

    fn cancel(&self) {
        self.gate.cancel();
        if let Some(audio) = self.backend() {
            audio.stop_all();
        }
    }

    fn reset(&self) {
        if let Some(audio) = self.backend() {
            audio.stop_all();
        }
        self.gate.clear();
    }

    fn dispose(&self) {
        self.gate.cancel();
        let audio = self.backend();
        if !self.lifecycle.dispose() {
            return;
        }
        if let Some(audio) = audio {
            audio.stop_all();
            audio.close();
        }
    }
}
