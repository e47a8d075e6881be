use std::sync::Arc;

use crate::backend::Capabilities;
use crate::core::{EffectUnit, UnitFactory, UnitKind};

use super::card_face::{DescriptorFaceComposer, FaceComposer};
use super::{CardRevealUnit, EmblemUnit, ParticleUnit, SoundUnit};

/// Factory for the built-in units.
#[derive(Clone)]
pub struct StandardUnits {
    face_composer: Arc<dyn FaceComposer>,
}

impl StandardUnits {
    pub fn new() -> Self {
        Self {
            face_composer: Arc::new(DescriptorFaceComposer),
        }
    }

    pub fn with_face_composer(mut self, composer: Arc<dyn FaceComposer>) -> Self {
        self.face_composer = composer;
        self
    }
}

impl Default for StandardUnits {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitFactory for StandardUnits {
    fn create(&self, kind: UnitKind, capabilities: &Capabilities) -> Box<dyn EffectUnit> {
        let renderer = capabilities.renderer.clone();
        match kind {
            UnitKind::Emblem => Box::new(EmblemUnit::new(renderer)),
            UnitKind::Particle => Box::new(ParticleUnit::new(renderer)),
            UnitKind::CardReveal => Box::new(CardRevealUnit::new(
                renderer,
                self.face_composer.clone(),
            )),
            UnitKind::Sound => Box::new(SoundUnit::new(capabilities.audio.clone())),
        }
    }
}

impl std::fmt::Debug for StandardUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardUnits").finish_non_exhaustive()
    }
}
