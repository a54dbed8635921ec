//! Time-domain rearrangements
//!
//! `Reverse` plays the signal backwards. `change_speed` plays it faster or
//! slower like a tape, moving tempo and pitch together, so unlike every
//! other effect its output length differs from the input's.

use serde::{Deserialize, Serialize};

use super::Effect;
use crate::engine::io::resample_linear;

/// Largest accepted speed change in cents, two octaves either way
pub const MAX_SPEED_CENTS: f64 = 2400.0;

/// Speed ratio bounds for a plain factor
pub const MIN_SPEED_RATIO: f64 = 0.25;
pub const MAX_SPEED_RATIO: f64 = 4.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Reverse;

impl Effect for Reverse {
    fn process(&mut self, samples: &mut [f32]) {
        samples.reverse();
    }

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "Reverse"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedParams {
    /// Cents when `use_semitones` is set, otherwise a plain ratio
    pub factor: f64,
    pub use_semitones: bool,
}

impl Default for SpeedParams {
    fn default() -> Self {
        Self {
            factor: 250.0,
            use_semitones: true,
        }
    }
}

impl SpeedParams {
    /// Playback speed ratio, >1 is faster
    pub fn ratio(&self) -> f64 {
        if self.use_semitones {
            let cents = self.factor.clamp(-MAX_SPEED_CENTS, MAX_SPEED_CENTS);
            2.0_f64.powf(cents / 1200.0)
        } else {
            self.factor.clamp(MIN_SPEED_RATIO, MAX_SPEED_RATIO)
        }
    }
}

/// Replay `samples` at `ratio()` times the speed; the result holds about
/// `len / ratio` samples
pub fn change_speed(samples: &[f32], params: &SpeedParams) -> Vec<f32> {
    let ratio = params.ratio();
    if (ratio - 1.0).abs() < 1e-9 {
        return samples.to_vec();
    }
    resample_linear(samples, 1.0 / ratio)
}
