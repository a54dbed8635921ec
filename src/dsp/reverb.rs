//! Reverb effect
//!
//! Mono Freeverb:
//! - 8 parallel comb filters for early reflections
//! - 4 series allpass filters for diffusion
//! - Pre-delay buffer
//!
//! Parameters use percentage scales (0-100) for reverberance, damping and
//! room scale, milliseconds for pre-delay and dB for the wet gain.

use serde::{Deserialize, Serialize};

use super::{db_to_linear, Effect};

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f32 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f32 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f32 = 0.4;

/// Input attenuation ahead of the comb bank
const INPUT_GAIN: f32 = 0.015;

/// Wet output scale
const WET_SCALE: f32 = 3.0;

/// Upper bound on pre-delay
pub const MAX_PRE_DELAY_MS: f64 = 500.0;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    /// Tail length, 0-100
    pub reverberance: f64,
    /// High-frequency damping, 0-100
    pub hf_damping: f64,
    /// Room size, 0-100; scales the delay lines
    pub room_scale: f64,
    /// Stereo spread, 0-100; signals are mono so it is recorded only
    pub stereo_depth: f64,
    /// Pre-delay in milliseconds
    pub pre_delay: f64,
    /// Wet gain in dB
    pub wet_gain: f64,
    /// Drop the dry signal
    pub wet_only: bool,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            reverberance: 50.0,
            hf_damping: 50.0,
            room_scale: 100.0,
            stereo_depth: 100.0,
            pre_delay: 20.0,
            wet_gain: 0.0,
            wet_only: false,
        }
    }
}

// ============================================================================
// Filter Components
// ============================================================================

/// Low-pass feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
    feedback: f32,
    damp1: f32,
    damp2: f32,
}

impl CombFilter {
    fn new(delay: usize, feedback: f32, damping: f32) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
            filter_state: 0.0,
            feedback,
            damp1: 1.0 - damping,
            damp2: damping,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];

        // One-pole low-pass in the feedback path
        self.filter_state = output * self.damp1 + self.filter_state * self.damp2;
        self.buffer[self.pos] = input + self.filter_state * self.feedback;

        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.pos = 0;
    }
}

/// Schroeder allpass section
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        Self {
            buffer: vec![0.0; delay.max(1)],
            pos: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.buffer[self.pos];
        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.pos] = input + ALLPASS_GAIN * output;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

// ============================================================================
// Reverb
// ============================================================================

#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    /// Pre-delay line; empty when there is no pre-delay
    pre_delay: Vec<f32>,
    pre_delay_pos: usize,
    dry: f32,
    wet: f32,
}

impl Reverb {
    pub fn new(params: &ReverbParams, sample_rate: u32) -> Self {
        let rate_scale = sample_rate as f64 / REFERENCE_SAMPLE_RATE;
        let room = 0.1 + 0.9 * (params.room_scale / 100.0).clamp(0.0, 1.0);

        let feedback = (params.reverberance / 100.0).clamp(0.0, 1.0) as f32 * ROOM_SCALE + ROOM_OFFSET;
        let damping = (params.hf_damping / 100.0).clamp(0.0, 1.0) as f32 * DAMP_SCALE;

        let combs = COMB_DELAYS
            .iter()
            .map(|&d| CombFilter::new((d as f64 * rate_scale * room) as usize, feedback, damping))
            .collect();
        let allpasses = ALLPASS_DELAYS
            .iter()
            .map(|&d| AllpassFilter::new((d as f64 * rate_scale) as usize))
            .collect();

        let pre_delay_ms = params.pre_delay.clamp(0.0, MAX_PRE_DELAY_MS);
        let pre_delay_samples = (pre_delay_ms / 1000.0 * sample_rate as f64) as usize;

        Self {
            combs,
            allpasses,
            pre_delay: vec![0.0; pre_delay_samples],
            pre_delay_pos: 0,
            dry: if params.wet_only { 0.0 } else { 1.0 },
            wet: db_to_linear(params.wet_gain as f32) * WET_SCALE,
        }
    }

    fn delay_input(&mut self, input: f32) -> f32 {
        if self.pre_delay.is_empty() {
            return input;
        }
        let delayed = self.pre_delay[self.pre_delay_pos];
        self.pre_delay[self.pre_delay_pos] = input;
        self.pre_delay_pos = (self.pre_delay_pos + 1) % self.pre_delay.len();
        delayed
    }
}

impl Effect for Reverb {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = *sample;
            let delayed = self.delay_input(input) * INPUT_GAIN;

            let mut output: f32 = self.combs.iter_mut().map(|c| c.process(delayed)).sum();
            for allpass in &mut self.allpasses {
                output = allpass.process(output);
            }

            *sample = input * self.dry + output * self.wet;
        }
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
        self.pre_delay.fill(0.0);
        self.pre_delay_pos = 0;
    }

    fn effect_type(&self) -> &'static str {
        "Reverb"
    }
}
