//! Pitch shifting
//!
//! WSOLA (waveform-similarity overlap-add) stretches the signal in time by
//! the pitch ratio without changing its pitch; linear resampling back to the
//! original length then moves the pitch. Output length always equals input
//! length.

use serde::{Deserialize, Serialize};

use super::Effect;
use crate::engine::io::resample_linear;

/// Coarse search stride for the tree search
const COARSE_STRIDE: usize = 4;

/// Largest accepted shift, two octaves either way (cents)
pub const MAX_PITCH_SHIFT_CENTS: f64 = 2400.0;

/// Longest accepted WSOLA segment, search window or overlap (ms)
pub const MAX_WSOLA_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchParams {
    /// Shift in cents (100 per semitone)
    pub shift: f64,
    /// Coarse-to-fine similarity search instead of an exhaustive one
    pub use_tree: bool,
    /// WSOLA segment length in ms
    pub segment: f64,
    /// Similarity search window in ms
    pub search: f64,
    /// Crossfade length in ms
    pub overlap: f64,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self {
            shift: 0.0,
            use_tree: false,
            segment: 82.0,
            search: 14.68,
            overlap: 12.0,
        }
    }
}

impl PitchParams {
    /// Frequency ratio for the shift, clamped to two octaves
    pub fn ratio(&self) -> f64 {
        let shift = self.shift.clamp(-MAX_PITCH_SHIFT_CENTS, MAX_PITCH_SHIFT_CENTS);
        2.0_f64.powf(shift / 1200.0)
    }
}

#[derive(Debug, Clone)]
pub struct PitchShift {
    ratio: f64,
    segment: usize,
    search: usize,
    overlap: usize,
    use_tree: bool,
}

impl PitchShift {
    pub fn new(params: &PitchParams, sample_rate: u32) -> Self {
        let to_samples =
            |ms: f64| (ms.clamp(0.0, MAX_WSOLA_MS) / 1000.0 * sample_rate as f64).round() as usize;
        let segment = to_samples(params.segment).max(2);
        Self {
            ratio: params.ratio(),
            segment,
            search: to_samples(params.search),
            overlap: to_samples(params.overlap).clamp(1, segment - 1),
            use_tree: params.use_tree,
        }
    }

    /// Time-stretch `input` by `factor` (>1 lengthens) keeping its pitch
    fn stretch(&self, input: &[f32], factor: f64) -> Vec<f32> {
        let target_len = (input.len() as f64 * factor).round() as usize;
        if input.len() <= self.segment {
            return resample_linear(input, factor);
        }

        let output_hop = self.segment - self.overlap;
        let input_hop = output_hop as f64 / factor;

        let mut output = Vec::with_capacity(target_len.saturating_add(self.segment));
        output.extend_from_slice(&input[..self.segment]);

        let mut k = 1usize;
        while output.len() < target_len {
            let nominal = (k as f64 * input_hop).round() as usize;
            let last_start = input.len().saturating_sub(self.segment);
            if nominal > last_start {
                break;
            }

            let tail_start = output.len() - self.overlap;
            let best = self.best_offset(input, nominal, last_start, &output[tail_start..]);

            // Crossfade the overlap then append the rest of the segment
            for i in 0..self.overlap {
                let fade = (i + 1) as f32 / (self.overlap + 1) as f32;
                let mixed = output[tail_start + i] * (1.0 - fade) + input[best + i] * fade;
                output[tail_start + i] = mixed;
            }
            output.extend_from_slice(&input[best + self.overlap..best + self.segment]);
            k += 1;
        }

        if output.len() < target_len {
            // Signal ran out before the target; stretch what is left linearly
            let consumed = ((k as f64 * input_hop).round() as usize).min(input.len());
            let remainder = &input[consumed..];
            let missing = target_len - output.len();
            if !remainder.is_empty() {
                let ratio = missing as f64 / remainder.len() as f64;
                output.extend(resample_linear(remainder, ratio));
            }
        }
        output.resize(target_len, 0.0);
        output
    }

    /// Segment start near `nominal` whose head best matches `tail`
    fn best_offset(&self, input: &[f32], nominal: usize, last_start: usize, tail: &[f32]) -> usize {
        let lo = nominal.saturating_sub(self.search);
        let hi = nominal.saturating_add(self.search).min(last_start);
        if lo >= hi {
            return nominal.min(last_start);
        }

        let similarity = |start: usize| -> f32 {
            let candidate = &input[start..start + tail.len()];
            let dot: f32 = candidate.iter().zip(tail).map(|(a, b)| a * b).sum();
            let energy: f32 = candidate.iter().map(|a| a * a).sum();
            dot / energy.sqrt().max(1e-9)
        };

        let best_in = |range: &mut dyn Iterator<Item = usize>| {
            let mut best = (nominal.clamp(lo, hi), f32::NEG_INFINITY);
            for start in range {
                let score = similarity(start);
                if score > best.1 {
                    best = (start, score);
                }
            }
            best.0
        };

        if self.use_tree {
            let coarse = best_in(&mut (lo..=hi).step_by(COARSE_STRIDE));
            let fine_lo = coarse.saturating_sub(COARSE_STRIDE - 1).max(lo);
            let fine_hi = (coarse + COARSE_STRIDE - 1).min(hi);
            best_in(&mut (fine_lo..=fine_hi))
        } else {
            best_in(&mut (lo..=hi))
        }
    }
}

impl Effect for PitchShift {
    fn process(&mut self, samples: &mut [f32]) {
        if samples.is_empty() || (self.ratio - 1.0).abs() < 1e-9 {
            return;
        }
        let len = samples.len();
        let stretched = self.stretch(samples, self.ratio);
        let mut shifted = resample_linear(&stretched, len as f64 / stretched.len().max(1) as f64);
        shifted.resize(len, 0.0);
        samples.copy_from_slice(&shifted);
    }

    fn reset(&mut self) {}

    fn effect_type(&self) -> &'static str {
        "Pitch"
    }
}
