//! Tiny additive synthesizer for the sound unit.
//!
//! Oscillators are phase accumulators, noise is a 17-bit Galois LFSR, and
//! every cue is shaped by an ADSR envelope.

use std::f32::consts::TAU;

use summon_core::{PhaseName, RarityTier};

pub const SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
}

impl Waveform {
    /// Sample at a normalized phase in `[0, 1)`.
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Self::Sine => (phase * TAU).sin(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Attack, decay and release in seconds; sustain is a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Envelope {
    /// Gain at `t` seconds into a note lasting `length` seconds.
    pub fn level(&self, t: f32, length: f32) -> f32 {
        if t < 0.0 || t >= length {
            return 0.0;
        }
        let release_start = (length - self.release).max(0.0);
        let held = if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else {
            self.sustain
        };
        if t >= release_start && self.release > 0.0 {
            held * (length - t) / self.release
        } else {
            held
        }
    }
}

/// 17-bit Galois LFSR with taps at bits 13 and 16.
#[derive(Debug, Clone)]
pub struct NoiseLfsr {
    state: u32,
}

impl NoiseLfsr {
    const TAPS: u32 = 0x12000;

    pub fn new() -> Self {
        Self { state: 1 }
    }

    /// Next sample, either 1.0 or -1.0.
    pub fn next_sample(&mut self) -> f32 {
        let lsb = self.state & 1;
        self.state >>= 1;
        if lsb != 0 {
            self.state ^= Self::TAPS;
        }
        if lsb != 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for NoiseLfsr {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub waveform: Waveform,
    pub freq_hz: f32,
    pub gain: f32,
}

/// Everything needed to render one cue.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub voices: Vec<Voice>,
    pub noise_gain: f32,
    pub envelope: Envelope,
    pub length_secs: f32,
}

fn voice(waveform: Waveform, freq_hz: f32, gain: f32) -> Voice {
    Voice {
        waveform,
        freq_hz,
        gain,
    }
}

fn adsr(attack: f32, decay: f32, sustain: f32, release: f32) -> Envelope {
    Envelope {
        attack,
        decay,
        sustain,
        release,
    }
}

/// Cue for a phase, pitched by rarity and capped at `max_voices`
/// oscillators.
pub fn recipe_for(phase: PhaseName, rarity: RarityTier, max_voices: u32) -> Recipe {
    use Waveform::{Sine, Square};

    let base = rarity.base_pitch_hz();
    let (voices, noise_gain, envelope, length_secs) = match phase {
        PhaseName::Emblem => (
            vec![voice(Sine, base * 0.5, 0.6), voice(Sine, base * 0.75, 0.3)],
            0.0,
            adsr(0.4, 0.3, 0.7, 0.4),
            1.6,
        ),
        PhaseName::EnergyGather => (
            vec![voice(Sine, base, 0.5), voice(Square, base * 2.0, 0.1)],
            0.08,
            adsr(0.8, 0.1, 0.9, 0.2),
            1.4,
        ),
        PhaseName::Burst => (
            vec![voice(Square, base * 2.0, 0.3), voice(Sine, base * 0.5, 0.4)],
            0.5,
            adsr(0.005, 0.25, 0.3, 0.2),
            0.7,
        ),
        PhaseName::Reveal => (
            vec![
                voice(Sine, base, 0.4),
                voice(Sine, base * 1.25, 0.3),
                voice(Sine, base * 1.5, 0.3),
                voice(Sine, base * 2.0, 0.2),
            ],
            0.0,
            adsr(0.05, 0.4, 0.6, 0.8),
            2.0,
        ),
        PhaseName::Settle => (
            vec![voice(Sine, base * 2.0, 0.4)],
            0.0,
            adsr(0.01, 0.15, 0.2, 0.15),
            0.4,
        ),
        PhaseName::Handoff => (
            vec![voice(Sine, base * 1.5, 0.3), voice(Sine, base * 3.0, 0.1)],
            0.03,
            adsr(0.02, 0.2, 0.4, 0.3),
            0.6,
        ),
    };

    Recipe {
        voices: voices.into_iter().take(max_voices as usize).collect(),
        noise_gain,
        envelope,
        length_secs,
    }
}

/// Render a recipe to mono samples in `[-1, 1]`.
pub fn render(recipe: &Recipe, sample_rate: u32) -> Vec<f32> {
    if sample_rate == 0 {
        return Vec::new();
    }
    let sr = sample_rate as f32;
    let total = (recipe.length_secs * sr).round() as usize;
    let headroom = (recipe.voices.iter().map(|v| v.gain).sum::<f32>() + recipe.noise_gain).max(1.0);

    let mut phases = vec![0.0f32; recipe.voices.len()];
    let mut noise = NoiseLfsr::new();
    let mut samples = Vec::with_capacity(total);
    for n in 0..total {
        let t = n as f32 / sr;
        let mut mix = 0.0;
        for (voice, phase) in recipe.voices.iter().zip(phases.iter_mut()) {
            mix += voice.gain * voice.waveform.sample(*phase);
            *phase = (*phase + voice.freq_hz / sr).fract();
        }
        if recipe.noise_gain > 0.0 {
            mix += recipe.noise_gain * noise.next_sample();
        }
        samples.push(mix / headroom * recipe.envelope.level(t, recipe.length_secs));
    }
    samples
}
