//! DSP primitives
//!
//! Mono, offline signal processors behind one `Effect` trait. An effect is
//! described by an `EffectSpec` value; `apply` builds a fresh processor for
//! it and runs it over a copy of the samples, so no state leaks between
//! calls. `Speed` is the one effect that changes the signal length; it has
//! no processor and only runs through `apply`.

mod biquad;
mod dynamics;
mod modulation;
mod noise;
mod pitch;
mod reverb;
mod saturation;
mod time;

pub use biquad::{Biquad, BiquadCoeffs, FilterParams, FilterType, PeakingParams, ShelfParams};
pub use dynamics::{Compressor, CompressorParams, Limiter, LimiterParams};
pub use modulation::{DelayParams, Echo, Phaser, PhaserParams, MAX_DELAY_MS};
pub use noise::{WhiteNoise, WhiteNoiseParams};
pub use pitch::{PitchParams, PitchShift, MAX_PITCH_SHIFT_CENTS, MAX_WSOLA_MS};
pub use reverb::{Reverb, ReverbParams, MAX_PRE_DELAY_MS};
pub use saturation::{Overdrive, OverdriveParams};
pub use time::{
    change_speed, Reverse, SpeedParams, MAX_SPEED_CENTS, MAX_SPEED_RATIO, MIN_SPEED_RATIO,
};

pub use crate::engine::buffer::{db_to_linear, linear_to_db};

use crate::error::{AugmentError, Result};

/// A mono signal processor
///
/// Processors own their state (filter history, delay lines) and process
/// samples in place; the output always has the input's length.
pub trait Effect: Send {
    /// Process samples in place
    fn process(&mut self, samples: &mut [f32]);

    /// Clear internal state
    fn reset(&mut self);

    /// Effect tag, matching the recipe step tag
    fn effect_type(&self) -> &'static str;
}

/// One effect with its typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum EffectSpec {
    Equalizer(PeakingParams),
    BandPass(FilterParams),
    BandReject(FilterParams),
    LowShelf(ShelfParams),
    HighShelf(ShelfParams),
    HighPass(FilterParams),
    LowPass(FilterParams),
    Limiter(LimiterParams),
    Compressor(CompressorParams),
    Delay(DelayParams),
    Overdrive(OverdriveParams),
    Phaser(PhaserParams),
    Pitch(PitchParams),
    Reverb(ReverbParams),
    WhiteNoise(WhiteNoiseParams),
    Reverse,
    Speed(SpeedParams),
}

impl EffectSpec {
    /// Tag naming the effect kind
    pub fn tag(&self) -> &'static str {
        match self {
            EffectSpec::Equalizer(_) => "Equalizer",
            EffectSpec::BandPass(_) => "BandPass",
            EffectSpec::BandReject(_) => "BandReject",
            EffectSpec::LowShelf(_) => "LowShelf",
            EffectSpec::HighShelf(_) => "HighShelf",
            EffectSpec::HighPass(_) => "HighPass",
            EffectSpec::LowPass(_) => "LowPass",
            EffectSpec::Limiter(_) => "Limiter",
            EffectSpec::Compressor(_) => "Compressor",
            EffectSpec::Delay(_) => "Delay",
            EffectSpec::Overdrive(_) => "Overdrive",
            EffectSpec::Phaser(_) => "Phaser",
            EffectSpec::Pitch(_) => "Pitch",
            EffectSpec::Reverb(_) => "Reverb",
            EffectSpec::WhiteNoise(_) => "WhiteNoise",
            EffectSpec::Reverse => "Reverse",
            EffectSpec::Speed(_) => "Speed",
        }
    }

    /// Build a fresh processor for `sample_rate`
    ///
    /// `None` for `Speed`, which changes the length and has no in-place form.
    pub fn build(&self, sample_rate: u32) -> Option<Box<dyn Effect>> {
        let processor: Box<dyn Effect> = match self {
            EffectSpec::Equalizer(p) => Box::new(Biquad::peaking(p, sample_rate)),
            EffectSpec::BandPass(p) => Box::new(Biquad::pass(FilterType::BandPass, p, sample_rate)),
            EffectSpec::BandReject(p) => {
                Box::new(Biquad::pass(FilterType::BandReject, p, sample_rate))
            }
            EffectSpec::LowShelf(p) => Box::new(Biquad::low_shelf(p, sample_rate)),
            EffectSpec::HighShelf(p) => Box::new(Biquad::high_shelf(p, sample_rate)),
            EffectSpec::HighPass(p) => Box::new(Biquad::pass(FilterType::HighPass, p, sample_rate)),
            EffectSpec::LowPass(p) => Box::new(Biquad::pass(FilterType::LowPass, p, sample_rate)),
            EffectSpec::Limiter(p) => Box::new(Limiter::new(p, sample_rate)),
            EffectSpec::Compressor(p) => Box::new(Compressor::new(p, sample_rate)),
            EffectSpec::Delay(p) => Box::new(Echo::new(p, sample_rate)),
            EffectSpec::Overdrive(p) => Box::new(Overdrive::new(p)),
            EffectSpec::Phaser(p) => Box::new(Phaser::new(p, sample_rate)),
            EffectSpec::Pitch(p) => Box::new(PitchShift::new(p, sample_rate)),
            EffectSpec::Reverb(p) => Box::new(Reverb::new(p, sample_rate)),
            EffectSpec::WhiteNoise(p) => Box::new(WhiteNoise::new(p)),
            EffectSpec::Reverse => Box::new(Reverse),
            EffectSpec::Speed(_) => return None,
        };
        Some(processor)
    }

    /// Whether the output has the input's length
    pub fn keeps_length(&self) -> bool {
        !matches!(self, EffectSpec::Speed(_))
    }
}

/// Run `spec` over a copy of `samples`
///
/// Fails with `Dsp` when the processor produces non-finite samples.
pub fn apply(spec: &EffectSpec, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
    let output = match spec {
        EffectSpec::Speed(p) => change_speed(samples, p),
        _ => {
            let mut output = samples.to_vec();
            if let Some(mut processor) = spec.build(sample_rate) {
                processor.process(&mut output);
            }
            output
        }
    };

    if let Some(index) = output.iter().position(|s| !s.is_finite()) {
        return Err(AugmentError::Dsp {
            effect: spec.tag().to_string(),
            reason: format!("non-finite output at sample {}", index),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    #[test]
    fn test_apply_keeps_length_and_input() {
        let input = generate_test_tone(440.0, 0.25, 16000);
        let spec = EffectSpec::LowPass(FilterParams {
            frequency: 1000.0,
            q: 0.707,
        });
        let output = apply(&spec, &input, 16000).unwrap();
        assert_eq!(output.len(), input.len());
        assert_eq!(input, generate_test_tone(440.0, 0.25, 16000));
    }

    #[test]
    fn test_apply_is_stateless_between_calls() {
        let input = generate_test_tone(440.0, 0.1, 16000);
        let spec = EffectSpec::Reverb(ReverbParams::default());
        let first = apply(&spec, &input, 16000).unwrap();
        let second = apply(&spec, &input, 16000).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_processor_tags_match_effect_tags() {
        let specs = vec![
            EffectSpec::HighShelf(ShelfParams {
                slope: 0.5,
                gain: -6.0,
                frequency: 3000.0,
            }),
            EffectSpec::Limiter(LimiterParams { gain: 3.0 }),
            EffectSpec::Pitch(PitchParams::default()),
            EffectSpec::Overdrive(OverdriveParams {
                gain: 20.0,
                colour: 20.0,
            }),
            EffectSpec::WhiteNoise(WhiteNoiseParams::with_seed(5)),
            EffectSpec::Reverse,
        ];
        for spec in specs {
            let processor = spec.build(16000).unwrap();
            assert_eq!(processor.effect_type(), spec.tag());
            assert!(spec.keeps_length());
        }
    }

    #[test]
    fn test_speed_changes_length() {
        let input = generate_test_tone(440.0, 0.5, 16000);
        let spec = EffectSpec::Speed(SpeedParams {
            factor: -1200.0,
            use_semitones: true,
        });
        assert!(spec.build(16000).is_none());
        assert!(!spec.keeps_length());
        let output = apply(&spec, &input, 16000).unwrap();
        assert_eq!(output.len(), input.len() * 2);
    }

    #[test]
    fn test_oversized_params_do_not_panic() {
        let input = generate_test_tone(440.0, 0.1, 16000);
        let specs = vec![
            EffectSpec::Pitch(PitchParams {
                shift: 1.3e6,
                ..PitchParams::default()
            }),
            EffectSpec::Delay(DelayParams {
                gain_in: 0.5,
                gain_out: 0.5,
                delays: vec![1e300],
                decays: vec![0.5],
                parallel: false,
            }),
        ];
        for spec in specs {
            let output = apply(&spec, &input, 16000).unwrap();
            assert_eq!(output.len(), input.len());
        }
    }

    #[test]
    fn test_non_finite_output_is_reported() {
        let spec = EffectSpec::Limiter(LimiterParams { gain: 0.0 });
        let result = apply(&spec, &[0.1, f32::NAN], 16000);
        assert!(matches!(result, Err(AugmentError::Dsp { .. })));
    }
}
