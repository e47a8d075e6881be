//! Concrete effect units.
//!
//! - [`EmblemUnit`] - Rotating concentric rings with glyph markers
//! - [`ParticleUnit`] - Ring flow during energy gathering, radial burst
//! - [`CardRevealUnit`] - Spinning card with an invisible face swap
//! - [`SoundUnit`] - Synthesized per-phase cues
//! - [`StandardUnits`] - Factory wiring the four together

mod card_face;
mod card_reveal;
mod emblem;
mod factory;
mod particle;
mod playback;
mod sound;
pub mod synth;

#[cfg(test)]
pub(crate) mod test_support;

pub use card_face::{DescriptorFaceComposer, FaceComposer, FaceError};
pub use card_reveal::{CardMotion, CardRevealUnit};
pub use emblem::EmblemUnit;
pub use factory::StandardUnits;
pub use particle::ParticleUnit;
pub use playback::PlaybackGate;
pub use sound::SoundUnit;
