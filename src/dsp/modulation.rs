//! Delay-line effects
//!
//! - `Echo`: multi-tap echo, taps either read the dry input (parallel) or
//!   are cascaded so each echo also repeats the earlier ones
//! - `Phaser`: LFO-modulated delay with feedback

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::Effect;

/// Longest accepted echo tap or phaser delay (ms)
pub const MAX_DELAY_MS: f64 = 5000.0;

/// Circular delay line
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Line able to hold `max_delay` samples of history
    fn new(max_delay: usize) -> Self {
        Self {
            buffer: vec![0.0; max_delay + 1],
            write_pos: 0,
        }
    }

    /// Sample written `delay` samples ago
    #[inline]
    fn read(&self, delay: usize) -> f32 {
        let size = self.buffer.len();
        let delay = delay.min(size - 1);
        let read_pos = if self.write_pos >= delay {
            self.write_pos - delay
        } else {
            size - (delay - self.write_pos)
        };
        self.buffer[read_pos % size]
    }

    /// Store a sample and advance
    #[inline]
    fn push(&mut self, sample: f32) {
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        self.buffer[self.write_pos] = sample;
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[inline]
fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms.clamp(0.0, MAX_DELAY_MS) / 1000.0 * sample_rate as f64).round() as usize
}

// ============================================================================
// Echo
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayParams {
    pub gain_in: f64,
    pub gain_out: f64,
    /// Tap delays in milliseconds
    pub delays: Vec<f64>,
    /// Tap decays, one per delay
    pub decays: Vec<f64>,
    pub parallel: bool,
}

#[derive(Debug, Clone)]
pub struct Echo {
    gain_in: f32,
    gain_out: f32,
    /// (delay in samples, decay) per tap
    taps: Vec<(usize, f32)>,
    parallel: bool,
    /// One line for parallel taps, one per stage when cascaded
    lines: Vec<DelayLine>,
}

impl Echo {
    pub fn new(params: &DelayParams, sample_rate: u32) -> Self {
        let taps: Vec<(usize, f32)> = params
            .delays
            .iter()
            .zip(&params.decays)
            .map(|(&d, &decay)| (ms_to_samples(d, sample_rate).max(1), decay as f32))
            .collect();

        let lines = if params.parallel {
            let longest = taps.iter().map(|t| t.0).max().unwrap_or(1);
            vec![DelayLine::new(longest)]
        } else {
            taps.iter().map(|t| DelayLine::new(t.0)).collect()
        };

        Self {
            gain_in: params.gain_in as f32,
            gain_out: params.gain_out as f32,
            taps,
            parallel: params.parallel,
            lines,
        }
    }
}

impl Effect for Echo {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let input = *sample * self.gain_in;

            let output = if self.parallel {
                let line = &mut self.lines[0];
                line.push(input);
                input
                    + self
                        .taps
                        .iter()
                        .map(|&(delay, decay)| line.read(delay) * decay)
                        .sum::<f32>()
            } else {
                let mut stage = input;
                for (line, &(delay, decay)) in self.lines.iter_mut().zip(&self.taps) {
                    line.push(stage);
                    stage += line.read(delay) * decay;
                }
                stage
            };

            *sample = output * self.gain_out;
        }
    }

    fn reset(&mut self) {
        self.lines.iter_mut().for_each(DelayLine::clear);
    }

    fn effect_type(&self) -> &'static str {
        "Delay"
    }
}

// ============================================================================
// Phaser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaserParams {
    pub gain_in: f64,
    pub gain_out: f64,
    /// Maximum delay in milliseconds
    pub delay: f64,
    /// Feedback, 0 <= decay < 1
    pub decay: f64,
    /// LFO rate in Hz
    pub speed: f64,
    /// Triangle LFO instead of sine
    pub triangular: bool,
}

#[derive(Debug, Clone)]
pub struct Phaser {
    gain_in: f32,
    gain_out: f32,
    decay: f32,
    max_delay: usize,
    /// LFO phase increment per sample (cycles)
    lfo_step: f64,
    lfo_phase: f64,
    triangular: bool,
    line: DelayLine,
}

impl Phaser {
    pub fn new(params: &PhaserParams, sample_rate: u32) -> Self {
        let max_delay = ms_to_samples(params.delay, sample_rate).max(1);
        Self {
            gain_in: params.gain_in as f32,
            gain_out: params.gain_out as f32,
            decay: params.decay as f32,
            max_delay,
            lfo_step: params.speed / sample_rate as f64,
            lfo_phase: 0.0,
            triangular: params.triangular,
            line: DelayLine::new(max_delay),
        }
    }

    /// LFO value in [0, 1]
    fn lfo(&self) -> f64 {
        if self.triangular {
            1.0 - (2.0 * self.lfo_phase - 1.0).abs()
        } else {
            0.5 - 0.5 * (2.0 * PI * self.lfo_phase).cos()
        }
    }
}

impl Effect for Phaser {
    fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let delay = 1 + (self.lfo() * (self.max_delay - 1) as f64).round() as usize;
            let wet = *sample * self.gain_in + self.line.read(delay - 1) * self.decay;
            self.line.push(wet);

            self.lfo_phase = (self.lfo_phase + self.lfo_step).fract();
            *sample = wet * self.gain_out;
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.lfo_phase = 0.0;
    }

    fn effect_type(&self) -> &'static str {
        "Phaser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<f32> {
        let mut samples = vec![0.0; len];
        samples[0] = 1.0;
        samples
    }

    #[test]
    fn test_delay_line_read() {
        let mut line = DelayLine::new(4);
        for s in [1.0, 2.0, 3.0] {
            line.push(s);
        }
        assert_eq!(line.read(0), 3.0);
        assert_eq!(line.read(2), 1.0);
    }

    #[test]
    fn test_parallel_echo_taps() {
        let params = DelayParams {
            gain_in: 1.0,
            gain_out: 1.0,
            delays: vec![10.0, 20.0],
            decays: vec![0.5, 0.25],
            parallel: true,
        };
        // 1000 Hz: 10 ms = 10 samples
        let mut echo = Echo::new(&params, 1000);
        let mut samples = impulse(40);
        echo.process(&mut samples);
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[10], 0.5);
        assert_eq!(samples[20], 0.25);
        assert_eq!(samples[30], 0.0);
    }

    #[test]
    fn test_cascaded_echo_repeats_earlier_echoes() {
        let params = DelayParams {
            gain_in: 1.0,
            gain_out: 1.0,
            delays: vec![10.0, 20.0],
            decays: vec![0.5, 0.5],
            parallel: false,
        };
        let mut echo = Echo::new(&params, 1000);
        let mut samples = impulse(40);
        echo.process(&mut samples);
        assert_eq!(samples[10], 0.5);
        assert_eq!(samples[20], 0.5);
        // Second stage repeats the first echo
        assert_eq!(samples[30], 0.25);
    }

    #[test]
    fn test_echo_gains() {
        let params = DelayParams {
            gain_in: 0.5,
            gain_out: 0.5,
            delays: vec![5.0],
            decays: vec![0.5],
            parallel: true,
        };
        let mut echo = Echo::new(&params, 1000);
        let mut samples = impulse(10);
        echo.process(&mut samples);
        assert_eq!(samples[0], 0.25);
        assert_eq!(samples[5], 0.125);
    }

    #[test]
    fn test_oversized_delays_are_clamped() {
        let params = DelayParams {
            gain_in: 1.0,
            gain_out: 1.0,
            delays: vec![1e300, 10.0],
            decays: vec![0.5, 0.5],
            parallel: true,
        };
        let mut echo = Echo::new(&params, 1000);
        assert_eq!(echo.taps[0].0, 5000);
        assert_eq!(echo.lines[0].buffer.len(), 5001);

        let mut samples = impulse(20);
        echo.process(&mut samples);
        assert_eq!(samples.len(), 20);
        assert_eq!(samples[10], 0.5);

        let phaser = Phaser::new(
            &PhaserParams {
                gain_in: 1.0,
                gain_out: 1.0,
                delay: f64::MAX,
                decay: 0.3,
                speed: 1.0,
                triangular: false,
            },
            1000,
        );
        assert_eq!(phaser.max_delay, 5000);
    }

    #[test]
    fn test_phaser_is_stable() {
        let params = PhaserParams {
            gain_in: 0.8,
            gain_out: 0.74,
            delay: 3.0,
            decay: 0.4,
            speed: 0.5,
            triangular: true,
        };
        let mut phaser = Phaser::new(&params, 16000);
        let mut samples: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.1).sin()).collect();
        phaser.process(&mut samples);
        assert!(samples.iter().all(|s| s.is_finite() && s.abs() < 2.0));
    }

    #[test]
    fn test_lfo_shapes_stay_in_range() {
        for triangular in [true, false] {
            let params = PhaserParams {
                gain_in: 1.0,
                gain_out: 1.0,
                delay: 2.0,
                decay: 0.3,
                speed: 2.0,
                triangular,
            };
            let mut phaser = Phaser::new(&params, 8000);
            for _ in 0..1000 {
                let value = phaser.lfo();
                assert!((0.0..=1.0).contains(&value));
                phaser.lfo_phase = (phaser.lfo_phase + phaser.lfo_step).fract();
            }
        }
    }
}
