//! Effect requests and the effect stage
//!
//! An effect arrives as a `(kind tag, parameter map)` pair, typically from a
//! recipe or the command line. `EffectSpec::from_params` turns it into a typed
//! variant; `Audio::apply_effect` runs it over a segment and splices the
//! processed slice back into the host.
//!
//! Every numeric parameter that sizes a buffer (delays, WSOLA windows) or
//! sets a ratio (pitch shift, speed) is bounded here, so a request that
//! parses always builds a processor of sane size.

use serde_json::Value;

use super::audio::{Audio, FittingMethod};
use super::recipe::{StepKind, StepParams, StepRecord};
use crate::dsp::{
    self, CompressorParams, DelayParams, EffectSpec, FilterParams, LimiterParams,
    OverdriveParams, PeakingParams, PhaserParams, PitchParams, ReverbParams, ShelfParams,
    SpeedParams, WhiteNoiseParams, MAX_DELAY_MS, MAX_PITCH_SHIFT_CENTS, MAX_PRE_DELAY_MS,
    MAX_SPEED_CENTS, MAX_SPEED_RATIO, MAX_WSOLA_MS, MIN_SPEED_RATIO,
};
use crate::engine::segment::TimeSegment;
use crate::error::{AugmentError, Result};

// ============================================================================
// Parameter parsing
// ============================================================================

/// Typed reads from a parameter map, reporting errors against one effect
struct ParamReader<'a> {
    effect: &'a str,
    params: &'a StepParams,
}

impl<'a> ParamReader<'a> {
    fn new(effect: &'a str, params: &'a StepParams) -> Self {
        Self { effect, params }
    }

    fn invalid(&self, param: &str, reason: impl Into<String>) -> AugmentError {
        AugmentError::InvalidParameter {
            effect: self.effect.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    fn missing(&self, param: &str) -> AugmentError {
        AugmentError::MissingParameter {
            effect: self.effect.to_string(),
            param: param.to_string(),
        }
    }

    /// Present and non-null value
    fn value(&self, name: &str) -> Option<&'a Value> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    fn to_number(&self, name: &str, value: &Value) -> Result<f64> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        match number {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(self.invalid(name, format!("expected a number, got {}", value))),
        }
    }

    fn number(&self, name: &str) -> Result<f64> {
        let value = self.value(name).ok_or_else(|| self.missing(name))?;
        self.to_number(name, value)
    }

    fn number_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.value(name) {
            Some(value) => self.to_number(name, value),
            None => Ok(default),
        }
    }

    fn to_flag(&self, name: &str, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|n| n != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.invalid(name, format!("expected a boolean, got {}", value))),
            },
            _ => Err(self.invalid(name, format!("expected a boolean, got {}", value))),
        }
    }

    fn flag(&self, name: &str) -> Result<bool> {
        let value = self.value(name).ok_or_else(|| self.missing(name))?;
        self.to_flag(name, value)
    }

    fn flag_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.value(name) {
            Some(value) => self.to_flag(name, value),
            None => Ok(default),
        }
    }

    /// A list of numbers; a bare number is a one-element list
    fn numbers(&self, name: &str) -> Result<Vec<f64>> {
        let value = self.value(name).ok_or_else(|| self.missing(name))?;
        match value {
            Value::Array(items) => items.iter().map(|v| self.to_number(name, v)).collect(),
            other => Ok(vec![self.to_number(name, other)?]),
        }
    }

    fn positive(&self, name: &str, value: f64) -> Result<f64> {
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(name, format!("must be positive, got {}", value)))
        }
    }

    fn non_negative(&self, name: &str, value: f64) -> Result<f64> {
        if value >= 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(name, format!("must not be negative, got {}", value)))
        }
    }

    fn within(&self, name: &str, value: f64, low: f64, high: f64) -> Result<f64> {
        if (low..=high).contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid(name, format!("must be within {}..={}, got {}", low, high, value)))
        }
    }

    /// Explicit seed, or a fresh one so the resolved recipe replays
    fn seed_or_random(&self, name: &str) -> Result<u64> {
        let value = match self.value(name) {
            Some(value) => value,
            None => return Ok(rand::random()),
        };
        let seed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        seed.ok_or_else(|| self.invalid(name, format!("expected an unsigned integer, got {}", value)))
    }

    fn filter(&self) -> Result<FilterParams> {
        Ok(FilterParams {
            frequency: self.positive("frequency", self.number("frequency")?)?,
            q: self.positive("q", self.number("q")?)?,
        })
    }

    fn shelf(&self) -> Result<ShelfParams> {
        let slope = self.number("slope")?;
        if !(slope > 0.0 && slope <= 1.0) {
            return Err(self.invalid("slope", format!("must be within (0, 1], got {}", slope)));
        }
        Ok(ShelfParams {
            slope,
            gain: self.number("gain")?,
            frequency: self.positive("frequency", self.number("frequency")?)?,
        })
    }
}

impl EffectSpec {
    /// Parse an effect from its tag and parameter map
    pub fn from_params(kind: &str, params: &StepParams) -> Result<EffectSpec> {
        let r = ParamReader::new(kind, params);
        let spec = match kind {
            "Equalizer" => EffectSpec::Equalizer(PeakingParams {
                frequency: r.positive("frequency", r.number("frequency")?)?,
                q: r.positive("q", r.number("q")?)?,
                db: r.number("db")?,
            }),
            "BandPass" => EffectSpec::BandPass(r.filter()?),
            "BandReject" => EffectSpec::BandReject(r.filter()?),
            "HighPass" => EffectSpec::HighPass(r.filter()?),
            "LowPass" => EffectSpec::LowPass(r.filter()?),
            "LowShelf" => EffectSpec::LowShelf(r.shelf()?),
            "HighShelf" => EffectSpec::HighShelf(r.shelf()?),
            "Limiter" => EffectSpec::Limiter(LimiterParams {
                gain: r.number("gain")?,
            }),
            "Compressor" => EffectSpec::Compressor(CompressorParams {
                attack: r.non_negative("attack", r.number("attack")?)?,
                decay: r.non_negative("decay", r.number("decay")?)?,
                soft_knee: r.non_negative("soft_knee", r.number("soft_knee")?)?,
                threshold: r.number("threshold")?,
                db_from: r.number("db_from")?,
                db_to: r.number("db_to")?,
            }),
            "Delay" => {
                let delays = r.numbers("delays")?;
                let decays = r.numbers("decays")?;
                if delays.is_empty() {
                    return Err(r.invalid("delays", "at least one delay is required"));
                }
                if delays.len() != decays.len() {
                    return Err(r.invalid(
                        "decays",
                        format!("{} decays for {} delays", decays.len(), delays.len()),
                    ));
                }
                for &delay in &delays {
                    r.within("delays", delay, 0.0, MAX_DELAY_MS)?;
                }
                EffectSpec::Delay(DelayParams {
                    gain_in: r.number("gain_in")?,
                    gain_out: r.number("gain_out")?,
                    delays,
                    decays,
                    parallel: r.flag("parallel")?,
                })
            }
            "Overdrive" => EffectSpec::Overdrive(OverdriveParams {
                gain: r.non_negative("gain", r.number("gain")?)?,
                colour: r.non_negative("colour", r.number("colour")?)?,
            }),
            "Phaser" => {
                let decay = r.number("decay")?;
                if !(0.0..1.0).contains(&decay) {
                    return Err(r.invalid("decay", format!("must be within [0, 1), got {}", decay)));
                }
                EffectSpec::Phaser(PhaserParams {
                    gain_in: r.number("gain_in")?,
                    gain_out: r.number("gain_out")?,
                    delay: r.within(
                        "delay",
                        r.positive("delay", r.number("delay")?)?,
                        0.0,
                        MAX_DELAY_MS,
                    )?,
                    decay,
                    speed: r.positive("speed", r.number("speed")?)?,
                    triangular: r.flag("triangular")?,
                })
            }
            "Pitch" => {
                let d = PitchParams::default();
                let window = |name: &str, default: f64| -> Result<f64> {
                    r.within(name, r.number_or(name, default)?, 0.0, MAX_WSOLA_MS)
                };
                EffectSpec::Pitch(PitchParams {
                    shift: r.within(
                        "shift",
                        r.number_or("shift", d.shift)?,
                        -MAX_PITCH_SHIFT_CENTS,
                        MAX_PITCH_SHIFT_CENTS,
                    )?,
                    use_tree: r.flag_or("use_tree", d.use_tree)?,
                    segment: r.positive("segment", window("segment", d.segment)?)?,
                    search: window("search", d.search)?,
                    overlap: r.positive("overlap", window("overlap", d.overlap)?)?,
                })
            }
            "Reverb" => {
                let d = ReverbParams::default();
                let percent = |name: &str, default: f64| -> Result<f64> {
                    r.within(name, r.number_or(name, default)?, 0.0, 100.0)
                };
                EffectSpec::Reverb(ReverbParams {
                    reverberance: percent("reverberance", d.reverberance)?,
                    hf_damping: percent("hf_damping", d.hf_damping)?,
                    room_scale: percent("room_scale", d.room_scale)?,
                    stereo_depth: percent("stereo_depth", d.stereo_depth)?,
                    pre_delay: r.within(
                        "pre_delay",
                        r.number_or("pre_delay", d.pre_delay)?,
                        0.0,
                        MAX_PRE_DELAY_MS,
                    )?,
                    wet_gain: r.number_or("wet_gain", d.wet_gain)?,
                    wet_only: r.flag_or("wet_only", d.wet_only)?,
                })
            }
            "WhiteNoise" => {
                let d = WhiteNoiseParams::with_seed(0);
                EffectSpec::WhiteNoise(WhiteNoiseParams {
                    mean: r.number_or("mean", d.mean)?,
                    std: r.non_negative("std", r.number_or("std", d.std)?)?,
                    noise_factor: r
                        .non_negative("noise_factor", r.number_or("noise_factor", d.noise_factor)?)?,
                    seed: r.seed_or_random("seed")?,
                })
            }
            "Reverse" => EffectSpec::Reverse,
            "Speed" => {
                let d = SpeedParams::default();
                let use_semitones = r.flag_or("use_semitones", d.use_semitones)?;
                let factor = r.number_or("factor", d.factor)?;
                let factor = if use_semitones {
                    r.within("factor", factor, -MAX_SPEED_CENTS, MAX_SPEED_CENTS)?
                } else {
                    r.within("factor", factor, MIN_SPEED_RATIO, MAX_SPEED_RATIO)?
                };
                EffectSpec::Speed(SpeedParams {
                    factor,
                    use_semitones,
                })
            }
            other => {
                return Err(AugmentError::UnsupportedEffect {
                    kind: other.to_string(),
                })
            }
        };
        Ok(spec)
    }

    /// Fully-resolved parameter map, defaults included
    pub fn to_params(&self) -> Result<StepParams> {
        let value = match self {
            EffectSpec::Equalizer(p) => serde_json::to_value(p),
            EffectSpec::BandPass(p)
            | EffectSpec::BandReject(p)
            | EffectSpec::HighPass(p)
            | EffectSpec::LowPass(p) => serde_json::to_value(p),
            EffectSpec::LowShelf(p) | EffectSpec::HighShelf(p) => serde_json::to_value(p),
            EffectSpec::Limiter(p) => serde_json::to_value(p),
            EffectSpec::Compressor(p) => serde_json::to_value(p),
            EffectSpec::Delay(p) => serde_json::to_value(p),
            EffectSpec::Overdrive(p) => serde_json::to_value(p),
            EffectSpec::Phaser(p) => serde_json::to_value(p),
            EffectSpec::Pitch(p) => serde_json::to_value(p),
            EffectSpec::Reverb(p) => serde_json::to_value(p),
            EffectSpec::WhiteNoise(p) => serde_json::to_value(p),
            EffectSpec::Reverse => return Ok(StepParams::new()),
            EffectSpec::Speed(p) => serde_json::to_value(p),
        }?;
        Ok(serde_json::from_value(value)?)
    }

    /// Recipe step kind for this effect
    pub fn kind(&self) -> StepKind {
        match self {
            EffectSpec::Equalizer(_) => StepKind::Equalizer,
            EffectSpec::BandPass(_) => StepKind::BandPass,
            EffectSpec::BandReject(_) => StepKind::BandReject,
            EffectSpec::LowShelf(_) => StepKind::LowShelf,
            EffectSpec::HighShelf(_) => StepKind::HighShelf,
            EffectSpec::HighPass(_) => StepKind::HighPass,
            EffectSpec::LowPass(_) => StepKind::LowPass,
            EffectSpec::Limiter(_) => StepKind::Limiter,
            EffectSpec::Compressor(_) => StepKind::Compressor,
            EffectSpec::Delay(_) => StepKind::Delay,
            EffectSpec::Overdrive(_) => StepKind::Overdrive,
            EffectSpec::Phaser(_) => StepKind::Phaser,
            EffectSpec::Pitch(_) => StepKind::Pitch,
            EffectSpec::Reverb(_) => StepKind::Reverb,
            EffectSpec::WhiteNoise(_) => StepKind::WhiteNoise,
            EffectSpec::Reverse => StepKind::Reverse,
            EffectSpec::Speed(_) => StepKind::Speed,
        }
    }
}

// ============================================================================
// Effect stage
// ============================================================================

impl Audio {
    /// Apply `effect` to `segment` (the whole buffer when `None`)
    ///
    /// The processed slice replaces the original samples of the segment;
    /// everything outside it is left as is. The dry segment is dropped, not
    /// summed with the wet one, which differs from `mix` where both weighted
    /// operands stay in the result. Rate is unchanged, and so is length
    /// except for `Speed`, whose resized slice is spliced in between the
    /// untouched head and tail.
    pub fn apply_effect(&self, effect: &EffectSpec, segment: Option<&TimeSegment>) -> Result<Audio> {
        let rate = self.sampling_rate();
        let segment = match segment {
            Some(segment) => *segment,
            None => TimeSegment::whole(self.buffer())?,
        };
        segment.check_nonempty(rate)?;
        segment.check_within(self.buffer())?;

        let (begin, end) = segment.to_sample_range(rate);
        let slice = self.slice(&segment);
        let processed = dsp::apply(effect, slice.samples(), rate)?;

        let mut result = if effect.keeps_length() {
            let wet = slice
                .fork(slice.buffer().with_samples(processed))
                .fit_length(end - begin, FittingMethod::Padding)
                .align_to(begin, self.len());
            let mut host = self.buffer().clone();
            host.silence(begin, end);
            self.derive(host).add(&wet, FittingMethod::Padding)?
        } else {
            let host = self.samples();
            let end = end.min(host.len());
            let mut spliced = Vec::with_capacity(host.len() - (end - begin) + processed.len());
            spliced.extend_from_slice(&host[..begin]);
            spliced.extend_from_slice(&processed);
            spliced.extend_from_slice(&host[end..]);
            self.derive(self.buffer().with_samples(spliced))
        };

        result.push_step(StepRecord {
            source: self.source_id(),
            kind: effect.kind(),
            params: effect.to_params()?,
        });
        Ok(result)
    }
}
