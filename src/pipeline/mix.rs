//! Weighted mixing of two pipeline values

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::audio::{Audio, FittingMethod};
use super::recipe::{StepKind, StepParams, StepRecord};
use crate::engine::segment::TimeSegment;
use crate::error::{AugmentError, Result};

/// Mix weights and the fitting applied to the other operand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixOptions {
    pub weight_of_me: f32,
    pub weight_of_other: f32,
    pub fitting_method: FittingMethod,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            weight_of_me: 0.5,
            weight_of_other: 0.5,
            fitting_method: FittingMethod::Looping,
        }
    }
}

impl MixOptions {
    fn to_params(self, opponent: String, segments: Option<&[TimeSegment]>) -> StepParams {
        let segments = match segments {
            Some(list) => Value::Array(
                list.iter()
                    .map(|s| json!([s.begin(), s.end()]))
                    .collect(),
            ),
            None => Value::Null,
        };

        let mut params = StepParams::new();
        params.insert("weightOfMe".to_string(), json!(self.weight_of_me));
        params.insert("weightOfOther".to_string(), json!(self.weight_of_other));
        params.insert(
            "fittingMethod".to_string(),
            json!(self.fitting_method.as_str()),
        );
        params.insert("opponent".to_string(), Value::String(opponent));
        params.insert("segments".to_string(), segments);
        params
    }
}

impl Audio {
    /// Mix `other` into this value
    ///
    /// Both operands are normalised and `other` is resampled to this value's
    /// rate. Without segments the whole of `other`, fitted to this value's
    /// length, is added. With segments, `segments[0]` selects where on this
    /// value and `segments[1]` (or `segments[0]` again) which part of
    /// `other`; the weighted sum of the two slices is laid back onto the
    /// weighted host at `segments[0].begin`. The result is normalised and
    /// keeps this value's rate and length.
    pub fn mix(
        &self,
        other: &Audio,
        segments: Option<&[TimeSegment]>,
        options: &MixOptions,
    ) -> Result<Audio> {
        let pair = match segments {
            None => None,
            Some([only]) => Some((*only, *only)),
            Some([mine, theirs]) => Some((*mine, *theirs)),
            Some(list) => {
                return Err(AugmentError::InvalidSegmentCount { count: list.len() });
            }
        };

        let rate = self.sampling_rate();
        let other = other.resample(rate)?.normalize()?;
        let me = self.normalize()?.gain(options.weight_of_me);

        let mixed = match pair {
            None => {
                let fitted = other
                    .fit_length(self.len(), options.fitting_method)
                    .gain(options.weight_of_other);
                me.add(&fitted, FittingMethod::Padding)?
            }
            Some((mine, theirs)) => {
                mine.check_nonempty(rate)?;
                mine.check_within(self.buffer())?;
                theirs.check_nonempty(rate)?;
                theirs.check_within(other.buffer())?;

                let (begin, _) = mine.to_sample_range(rate);
                let my_slice = me.slice(&mine);
                let their_slice = other
                    .slice(&theirs)
                    .fit_length(mine.range(rate), options.fitting_method)
                    .gain(options.weight_of_other);
                let sum = my_slice.add(&their_slice, FittingMethod::Padding)?;
                let aligned = sum.align_to(begin, me.len());
                me.add(&aligned, FittingMethod::Padding)?
            }
        };

        let mut result = mixed.normalize()?;
        result.push_step(StepRecord {
            source: other.source_id(),
            kind: StepKind::Mix,
            params: options.to_params(other.source_id(), segments),
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::SampleBuffer;
    use crate::engine::io::generate_test_tone;
    use crate::engine::segment::SegmentEnd;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn tone(freq: f32, secs: f32, rate: u32) -> Audio {
        Audio::new(SampleBuffer::from_samples(generate_test_tone(freq, secs, rate), rate).unwrap())
    }

    #[test_case(16000, 1.0 ; "same rate shorter")]
    #[test_case(8000, 3.0 ; "lower rate longer")]
    #[test_case(44100, 0.3 ; "higher rate much shorter")]
    fn test_mix_preserves_length(other_rate: u32, other_secs: f32) {
        let me = tone(220.0, 2.0, 16000);
        let other = tone(440.0, other_secs, other_rate);

        let whole = me.mix(&other, None, &MixOptions::default()).unwrap();
        assert_eq!(whole.len(), me.len());
        assert_eq!(whole.sampling_rate(), 16000);

        let seg = [
            me.segment(0.5, SegmentEnd::At(0.75)).unwrap(),
            other.segment(0.0, SegmentEnd::At(0.25)).unwrap(),
        ];
        let windowed = me.mix(&other, Some(&seg), &MixOptions::default()).unwrap();
        assert_eq!(windowed.len(), me.len());
    }

    #[test]
    fn test_mix_result_is_normalized() {
        let me = tone(220.0, 1.0, 8000).gain(0.1);
        let other = tone(330.0, 1.0, 8000);
        let mixed = me.mix(&other, None, &MixOptions::default()).unwrap();
        assert_relative_eq!(mixed.buffer().peak(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mix_only_touches_window() {
        let rate = 1000;
        let me = Audio::new(SampleBuffer::from_samples(vec![1.0; 1000], rate).unwrap());
        let other = Audio::new(SampleBuffer::from_samples(vec![-1.0; 1000], rate).unwrap());
        let seg = [TimeSegment::new(0.2, 0.4).unwrap()];
        let options = MixOptions {
            weight_of_me: 1.0,
            weight_of_other: 0.5,
            ..MixOptions::default()
        };
        let mixed = me.mix(&other, Some(&seg), &options).unwrap();

        // Outside: 1.0; inside: 1.0 + (1.0 - 0.5) = 1.5; normalised by 1.5
        assert_relative_eq!(mixed.samples()[100], 1.0 / 1.5, epsilon = 1e-6);
        assert_relative_eq!(mixed.samples()[300], 1.0, epsilon = 1e-6);
        assert_relative_eq!(mixed.samples()[500], 1.0 / 1.5, epsilon = 1e-6);
    }

    #[test]
    fn test_mix_records_step() {
        let me = tone(220.0, 1.0, 8000);
        let other = tone(440.0, 1.0, 8000);
        let mixed = me.mix(&other, None, &MixOptions::default()).unwrap();
        let again = mixed.mix(&other, None, &MixOptions::default()).unwrap();

        assert_eq!(again.recipe().kinds(), vec![StepKind::Mix, StepKind::Mix]);
        assert_eq!(again.suffix(), "|Mix|Mix");
        let params = &again.recipe().steps()[0].params;
        assert_eq!(params["fittingMethod"], json!("Looping"));
        assert_eq!(params["segments"], Value::Null);
        assert!(me.recipe().is_empty());
    }

    #[test]
    fn test_mix_segment_count() {
        let me = tone(220.0, 1.0, 8000);
        let seg = TimeSegment::new(0.0, 0.5).unwrap();
        let err = me
            .mix(&me, Some(&[seg, seg, seg]), &MixOptions::default())
            .unwrap_err();
        assert!(matches!(err, AugmentError::InvalidSegmentCount { count: 3 }));

        let err = me.mix(&me, Some(&[]), &MixOptions::default()).unwrap_err();
        assert!(matches!(err, AugmentError::InvalidSegmentCount { count: 0 }));
    }

    #[test]
    fn test_mix_segment_out_of_bounds() {
        let me = tone(220.0, 1.0, 8000);
        let other = tone(440.0, 0.5, 8000);
        let seg = [
            TimeSegment::new(0.0, 0.8).unwrap(),
            TimeSegment::new(0.2, 0.9).unwrap(),
        ];
        let err = me.mix(&other, Some(&seg), &MixOptions::default()).unwrap_err();
        assert!(matches!(err, AugmentError::SegmentOutOfBounds { .. }));
    }

    #[test]
    fn test_mix_silent_operand_fails() {
        let me = tone(220.0, 1.0, 8000);
        let silence = Audio::new(SampleBuffer::from_samples(vec![0.0; 100], 8000).unwrap());
        let err = me.mix(&silence, None, &MixOptions::default()).unwrap_err();
        assert!(matches!(err, AugmentError::SilentSignal));
    }
}
