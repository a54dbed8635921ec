//! Dynamics processors
//!
//! - `Limiter`: gain stage into a 0 dBFS brickwall
//! - `Compressor`: compander with a soft-knee static curve

use serde::{Deserialize, Serialize};

use super::{db_to_linear, linear_to_db, Effect};

/// Brickwall ceiling (0 dBFS)
const CEILING_LINEAR: f32 = 1.0;

/// Very fast attack for brickwall limiting (0.1ms)
const LIMITER_ATTACK_SECS: f32 = 0.0001;

/// Limiter release time
const LIMITER_RELEASE_SECS: f32 = 0.05;

/// Compressor ratios are capped to keep the knee interpolation finite
const MAX_RATIO: f64 = 1000.0;

/// One-pole smoothing coefficient for a time constant
#[inline]
fn time_to_coeff(time_secs: f32, sample_rate: u32) -> f32 {
    let samples = time_secs * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

// ============================================================================
// Limiter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterParams {
    /// Gain in dB applied before limiting
    pub gain: f64,
}

/// Gain followed by a 0 dBFS brickwall limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    gain_linear: f32,
    /// Current gain reduction in dB
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(params: &LimiterParams, sample_rate: u32) -> Self {
        Self {
            gain_linear: db_to_linear(params.gain as f32),
            envelope: 0.0,
            attack_coeff: time_to_coeff(LIMITER_ATTACK_SECS, sample_rate),
            release_coeff: time_to_coeff(LIMITER_RELEASE_SECS, sample_rate),
        }
    }
}

impl Effect for Limiter {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let driven = *sample * self.gain_linear;
            let peak = driven.abs();

            let target_reduction = if peak > CEILING_LINEAR {
                linear_to_db(peak).max(0.0)
            } else {
                0.0
            };

            self.envelope = if target_reduction > self.envelope {
                self.attack_coeff * self.envelope + (1.0 - self.attack_coeff) * target_reduction
            } else {
                self.release_coeff * self.envelope + (1.0 - self.release_coeff) * target_reduction
            };

            let limited = driven * db_to_linear(-self.envelope);
            // Final hard clip so the ceiling is never exceeded
            *sample = limited.clamp(-CEILING_LINEAR, CEILING_LINEAR);
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "Limiter"
    }
}

// ============================================================================
// Compressor
// ============================================================================

/// Compander parameters
///
/// Times are in seconds, levels in dB. The static curve is unity up to
/// `threshold`; above it the slope maps an input of `db_from` to an output
/// of `db_to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    pub attack: f64,
    pub decay: f64,
    pub soft_knee: f64,
    pub threshold: f64,
    pub db_from: f64,
    pub db_to: f64,
}

impl CompressorParams {
    /// Compression ratio implied by the transfer points
    pub fn ratio(&self) -> f64 {
        let input_span = self.db_from - self.threshold;
        let output_span = self.db_to - self.threshold;
        if input_span <= 0.0 {
            1.0
        } else if output_span <= 0.0 {
            MAX_RATIO
        } else {
            (input_span / output_span).clamp(1.0 / MAX_RATIO, MAX_RATIO)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compressor {
    threshold: f64,
    ratio: f64,
    knee: f64,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed linear gain
    gain: f32,
}

impl Compressor {
    pub fn new(params: &CompressorParams, sample_rate: u32) -> Self {
        Self {
            threshold: params.threshold,
            ratio: params.ratio(),
            knee: params.soft_knee.max(0.0),
            attack_coeff: time_to_coeff(params.attack as f32, sample_rate),
            release_coeff: time_to_coeff(params.decay as f32, sample_rate),
            gain: 1.0,
        }
    }

    /// Gain change in dB for an input level
    fn compute_gain_db(&self, input_db: f64) -> f64 {
        let threshold = self.threshold;
        let ratio = self.ratio;
        let knee = self.knee;

        if knee > 0.0 {
            let knee_start = threshold - knee / 2.0;
            let knee_end = threshold + knee / 2.0;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold + (input_db - threshold) / ratio) - input_db
            } else {
                // Quadratic interpolation from 1:1 to the full ratio
                let knee_factor = (input_db - knee_start) / knee;
                let effective_ratio = 1.0 + (ratio - 1.0) * knee_factor * knee_factor;
                (knee_start + (input_db - knee_start) / effective_ratio) - input_db
            }
        } else if input_db <= threshold {
            0.0
        } else {
            (threshold + (input_db - threshold) / ratio) - input_db
        }
    }
}

impl Effect for Compressor {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let level = sample.abs();
            let target = if level > 0.0 {
                db_to_linear(self.compute_gain_db(linear_to_db(level) as f64) as f32)
            } else {
                1.0
            };

            self.gain = if target < self.gain {
                self.attack_coeff * self.gain + (1.0 - self.attack_coeff) * target
            } else {
                self.release_coeff * self.gain + (1.0 - self.release_coeff) * target
            };

            *sample *= self.gain;
        }
    }

    fn reset(&mut self) {
        self.gain = 1.0;
    }

    fn effect_type(&self) -> &'static str {
        "Compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn compressor(threshold: f64, db_from: f64, db_to: f64, knee: f64) -> Compressor {
        Compressor::new(
            &CompressorParams {
                attack: 0.001,
                decay: 0.01,
                soft_knee: knee,
                threshold,
                db_from,
                db_to,
            },
            48000,
        )
    }

    #[test]
    fn test_limiter_below_ceiling_passes() {
        let mut limiter = Limiter::new(&LimiterParams { gain: 0.0 }, 48000);
        let mut samples = vec![0.5_f32; 1000];
        limiter.process(&mut samples);
        assert!(samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_limiter_gain_then_brickwall() {
        let mut limiter = Limiter::new(&LimiterParams { gain: 12.0 }, 48000);
        let mut samples: Vec<f32> = (0..4800).map(|i| (i as f32 * 0.05).sin() * 0.9).collect();
        limiter.process(&mut samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);
        assert!(peak <= 1.0);
        assert!(peak > 0.9);
    }

    #[test]
    fn test_ratio_from_transfer_points() {
        let params = CompressorParams {
            attack: 0.2,
            decay: 1.0,
            soft_knee: 2.0,
            threshold: -20.0,
            db_from: 0.0,
            db_to: -10.0,
        };
        assert_relative_eq!(params.ratio(), 2.0);

        let unity = CompressorParams {
            db_from: -20.0,
            db_to: -20.0,
            ..params
        };
        assert_relative_eq!(unity.ratio(), 1.0);
    }

    #[test]
    fn test_gain_computer_hard_knee() {
        let comp = compressor(-20.0, 0.0, -15.0, 0.0); // 4:1
        assert_relative_eq!(comp.compute_gain_db(-30.0), 0.0);
        assert_relative_eq!(comp.compute_gain_db(-20.0), 0.0);
        // 20 dB over threshold at 4:1 leaves 5 dB over
        assert_relative_eq!(comp.compute_gain_db(0.0), -15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_gain_computer_soft_knee_is_continuous() {
        let comp = compressor(-20.0, 0.0, -15.0, 6.0);
        assert_relative_eq!(comp.compute_gain_db(-23.0), 0.0);
        let inside = comp.compute_gain_db(-20.0);
        assert!(inside < 0.0 && inside > -2.0);
        let edge = comp.compute_gain_db(-17.0);
        assert_relative_eq!(edge, (-20.0 + 3.0 / 4.0) - -17.0, epsilon = 1e-9);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut comp = compressor(-20.0, 0.0, -15.0, 0.0);
        let mut samples = vec![1.0_f32; 48000];
        comp.process(&mut samples);
        // Settled gain is -15 dB
        assert!((samples[47999] - db_to_linear(-15.0)).abs() < 0.01);
    }
}
