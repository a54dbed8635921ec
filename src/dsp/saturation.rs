//! Overdrive
//!
//! Cubic soft-clipping waveshaper. `colour` biases the input so the curve
//! clips asymmetrically and adds even harmonics; a DC blocker removes the
//! offset the bias leaves behind.

use serde::{Deserialize, Serialize};

use super::{db_to_linear, Effect};

/// DC blocker pole
const DC_BLOCK_POLE: f32 = 0.995;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdriveParams {
    /// Drive in dB
    pub gain: f64,
    /// Even-harmonic colour, 0-100
    pub colour: f64,
}

/// Cubic soft clip: linear near zero, flat at +-2/3 beyond +-1
#[inline]
fn waveshape_cubic(x: f32) -> f32 {
    if x < -1.0 {
        -2.0 / 3.0
    } else if x > 1.0 {
        2.0 / 3.0
    } else {
        x - x * x * x / 3.0
    }
}

#[derive(Debug, Clone)]
pub struct Overdrive {
    drive: f32,
    bias: f32,
    prev_in: f32,
    prev_out: f32,
}

impl Overdrive {
    pub fn new(params: &OverdriveParams) -> Self {
        Self {
            drive: db_to_linear(params.gain as f32),
            bias: params.colour as f32 / 200.0,
            prev_in: 0.0,
            prev_out: 0.0,
        }
    }
}

impl Effect for Overdrive {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let shaped = waveshape_cubic(*sample * self.drive + self.bias);
            let output = shaped - self.prev_in + DC_BLOCK_POLE * self.prev_out;
            self.prev_in = shaped;
            self.prev_out = output;
            *sample = output;
        }
    }

    fn reset(&mut self) {
        self.prev_in = 0.0;
        self.prev_out = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "Overdrive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveshape_limits() {
        assert_eq!(waveshape_cubic(0.0), 0.0);
        assert_eq!(waveshape_cubic(5.0), 2.0 / 3.0);
        assert_eq!(waveshape_cubic(-5.0), -2.0 / 3.0);
        assert!((waveshape_cubic(1.0) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_waveshape_symmetry() {
        for &x in &[0.1_f32, 0.4, 0.9] {
            assert!((waveshape_cubic(x) + waveshape_cubic(-x)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_overdrive_bounds_output() {
        let mut drive = Overdrive::new(&OverdriveParams {
            gain: 20.0,
            colour: 20.0,
        });
        let mut samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.05).sin()).collect();
        drive.process(&mut samples);
        assert!(samples.iter().all(|s| s.is_finite() && s.abs() < 2.0));
    }

    #[test]
    fn test_dc_is_blocked() {
        let mut drive = Overdrive::new(&OverdriveParams {
            gain: 0.0,
            colour: 100.0,
        });
        let mut silence = vec![0.0_f32; 4000];
        drive.process(&mut silence);
        // The colour bias is a constant offset that decays away
        assert!(silence[3999].abs() < 0.01);
    }
}
