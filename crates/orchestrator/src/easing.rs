use std::f32::consts::PI;

/// Tween curves used by the effect units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ease {
    Linear,
    OutQuad,
    OutCubic,
    #[default]
    InOutCubic,
    InOutSine,
    /// Overshoots past 1.0 before settling back.
    OutBack,
}

/// Overshoot amount for `OutBack` (about 10%).
const BACK_OVERSHOOT: f32 = 1.70158;

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::InOutSine => -((PI * t).cos() - 1.0) / 2.0,
            Self::OutBack => {
                let c3 = BACK_OVERSHOOT + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + BACK_OVERSHOOT * (t - 1.0).powi(2)
            }
        }
    }
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Normalized progress of `elapsed` through `[start, start + span]`.
pub fn progress(elapsed: f32, start: f32, span: f32) -> f32 {
    if span <= 0.0 {
        return if elapsed >= start { 1.0 } else { 0.0 };
    }
    ((elapsed - start) / span).clamp(0.0, 1.0)
}
