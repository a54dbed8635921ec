//! Additive Gaussian noise
//!
//! Each sample gets `noise_factor * N(mean, std)` added. The generator is
//! seeded from the parameters, so a recipe replays to the same output.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::Effect;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhiteNoiseParams {
    pub mean: f64,
    /// Standard deviation, >= 0
    pub std: f64,
    /// Scale applied to each noise draw
    pub noise_factor: f64,
    pub seed: u64,
}

impl WhiteNoiseParams {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            mean: 0.0,
            std: 1.0,
            noise_factor: 0.009,
            seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhiteNoise {
    mean: f64,
    std: f64,
    noise_factor: f64,
    seed: u64,
    rng: StdRng,
}

impl WhiteNoise {
    pub fn new(params: &WhiteNoiseParams) -> Self {
        Self {
            mean: params.mean,
            std: params.std,
            noise_factor: params.noise_factor,
            seed: params.seed,
            rng: StdRng::seed_from_u64(params.seed),
        }
    }

    /// Standard normal draw (Box-Muller)
    fn standard_normal(&mut self) -> f64 {
        let u1 = 1.0 - self.rng.random::<f64>();
        let u2 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}

impl Effect for WhiteNoise {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let noise = self.mean + self.std * self.standard_normal();
            *sample += (self.noise_factor * noise) as f32;
        }
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn effect_type(&self) -> &'static str {
        "WhiteNoise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn noise(params: &WhiteNoiseParams, len: usize) -> Vec<f32> {
        let mut samples = vec![0.0; len];
        WhiteNoise::new(params).process(&mut samples);
        samples
    }

    #[test]
    fn test_same_seed_same_noise() {
        let params = WhiteNoiseParams::with_seed(7);
        assert_eq!(noise(&params, 500), noise(&params, 500));
        assert_ne!(noise(&params, 500), noise(&WhiteNoiseParams::with_seed(8), 500));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut effect = WhiteNoise::new(&WhiteNoiseParams::with_seed(3));
        let mut first = vec![0.0; 64];
        effect.process(&mut first);
        effect.reset();
        let mut second = vec![0.0; 64];
        effect.process(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_noise_statistics() {
        let params = WhiteNoiseParams {
            mean: 0.5,
            std: 2.0,
            noise_factor: 1.0,
            seed: 11,
        };
        let samples = noise(&params, 50_000);
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let var = samples.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
        assert_relative_eq!(mean, 0.5, epsilon = 0.05);
        assert_relative_eq!(var.sqrt(), 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_zero_factor_leaves_signal() {
        let params = WhiteNoiseParams {
            noise_factor: 0.0,
            ..WhiteNoiseParams::with_seed(1)
        };
        let mut samples = vec![0.25_f32; 10];
        WhiteNoise::new(&params).process(&mut samples);
        assert!(samples.iter().all(|&s| s == 0.25));
    }
}
