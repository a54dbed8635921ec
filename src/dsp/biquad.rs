//! Biquad filters
//!
//! Second-order IIR sections for the equalizer, pass, reject and shelving
//! effects. Coefficients follow the Audio EQ Cookbook.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::Effect;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Bell curve boost/cut
    Peak,
    /// Boost/cut below frequency
    LowShelf,
    /// Boost/cut above frequency
    HighShelf,
    /// Remove above frequency
    LowPass,
    /// Remove below frequency
    HighPass,
    /// Constant 0 dB peak gain band-pass
    BandPass,
    /// Notch
    BandReject,
}

/// Peaking equalizer parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakingParams {
    /// Centre frequency in Hz
    pub frequency: f64,
    pub q: f64,
    /// Boost (positive) or cut (negative) in dB
    pub db: f64,
}

/// Pass and reject filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub frequency: f64,
    pub q: f64,
}

/// Shelving filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfParams {
    /// Shelf slope, 0 < slope <= 1
    pub slope: f64,
    /// Shelf gain in dB
    pub gain: f64,
    pub frequency: f64,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate coefficients
    ///
    /// `q_or_slope` is the Q factor for peak and pass shapes and the shelf
    /// slope S for shelves.
    pub fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q_or_slope: f64,
    ) -> Self {
        // Keep the centre strictly inside (0, Nyquist)
        let freq = frequency.clamp(1.0, sample_rate * 0.499);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let a = 10.0_f64.powf(gain_db / 40.0);

        let alpha = match filter_type {
            FilterType::LowShelf | FilterType::HighShelf => {
                let slope = q_or_slope.clamp(1e-3, 1.0);
                sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt()
            }
            _ => sin_w0 / (2.0 * q_or_slope.max(1e-3)),
        };

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::LowShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::BandPass => (
                alpha,
                0.0,
                -alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::BandReject => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Filter history
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// A single biquad section over a mono signal
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl Biquad {
    pub fn new(
        filter_type: FilterType,
        sample_rate: u32,
        frequency: f64,
        gain_db: f64,
        q_or_slope: f64,
    ) -> Self {
        Self {
            filter_type,
            coeffs: BiquadCoeffs::calculate(
                filter_type,
                sample_rate as f64,
                frequency,
                gain_db,
                q_or_slope,
            ),
            state: BiquadState::default(),
        }
    }

    pub fn peaking(params: &PeakingParams, sample_rate: u32) -> Self {
        Self::new(FilterType::Peak, sample_rate, params.frequency, params.db, params.q)
    }

    /// Pass or reject filter; `filter_type` must not be a peak or shelf
    pub fn pass(filter_type: FilterType, params: &FilterParams, sample_rate: u32) -> Self {
        Self::new(filter_type, sample_rate, params.frequency, 0.0, params.q)
    }

    pub fn low_shelf(params: &ShelfParams, sample_rate: u32) -> Self {
        Self::new(
            FilterType::LowShelf,
            sample_rate,
            params.frequency,
            params.gain,
            params.slope,
        )
    }

    pub fn high_shelf(params: &ShelfParams, sample_rate: u32) -> Self {
        Self::new(
            FilterType::HighShelf,
            sample_rate,
            params.frequency,
            params.gain,
            params.slope,
        )
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }
}

impl Effect for Biquad {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.state.process(*sample as f64, &self.coeffs) as f32;
        }
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }

    fn effect_type(&self) -> &'static str {
        match self.filter_type {
            FilterType::Peak => "Equalizer",
            FilterType::LowShelf => "LowShelf",
            FilterType::HighShelf => "HighShelf",
            FilterType::LowPass => "LowPass",
            FilterType::HighPass => "HighPass",
            FilterType::BandPass => "BandPass",
            FilterType::BandReject => "BandReject",
        }
    }
}
