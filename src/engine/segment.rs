//! Time segments
//!
//! A `[begin, end)` range in seconds that restricts slicing, mixing and
//! effects to part of a buffer.

use serde::{Deserialize, Serialize};

use crate::engine::buffer::SampleBuffer;
use crate::error::{AugmentError, Result};

/// End of a segment as requested by a caller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentEnd {
    /// Absolute end time in seconds
    At(f64),
    /// Whatever the reference buffer's duration is
    EndOfBuffer,
}

/// Immutable `[begin, end)` time range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSegment {
    begin: f64,
    end: f64,
    #[serde(default)]
    complete: bool,
}

impl TimeSegment {
    /// Create a segment with an explicit end
    pub fn new(begin: f64, end: f64) -> Result<Self> {
        if !begin.is_finite() || !end.is_finite() || begin < 0.0 || end <= begin {
            return Err(AugmentError::EmptySegment { begin, end });
        }
        Ok(Self {
            begin,
            end,
            complete: false,
        })
    }

    /// Resolve a segment against a reference buffer
    ///
    /// `EndOfBuffer` becomes the buffer's duration. The segment is complete
    /// when it covers every sample of the buffer.
    pub fn resolve(begin: f64, end: SegmentEnd, buffer: &SampleBuffer) -> Result<Self> {
        let end = match end {
            SegmentEnd::At(end) => end,
            SegmentEnd::EndOfBuffer => buffer.duration(),
        };
        let mut segment = Self::new(begin, end)?;
        let (first, last) = segment.to_sample_range(buffer.sampling_rate());
        segment.complete = first == 0 && last == buffer.len();
        Ok(segment)
    }

    /// Segment covering a whole buffer
    pub fn whole(buffer: &SampleBuffer) -> Result<Self> {
        Self::resolve(0.0, SegmentEnd::EndOfBuffer, buffer)
    }

    #[inline]
    pub fn begin(&self) -> f64 {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.begin
    }

    /// Whether the segment spans its reference buffer entirely
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Sample indices `(round(begin*rate), round(end*rate))`
    pub fn to_sample_range(&self, rate: u32) -> (usize, usize) {
        let rate = rate as f64;
        (
            (self.begin * rate).round() as usize,
            (self.end * rate).round() as usize,
        )
    }

    /// Number of samples covered at `rate`
    pub fn range(&self, rate: u32) -> usize {
        let (begin, end) = self.to_sample_range(rate);
        end.saturating_sub(begin)
    }

    /// Fail unless the segment ends within `buffer`, at sample resolution
    pub fn check_within(&self, buffer: &SampleBuffer) -> Result<()> {
        let (_, end) = self.to_sample_range(buffer.sampling_rate());
        if end > buffer.len() {
            return Err(AugmentError::SegmentOutOfBounds {
                begin: self.begin,
                end: self.end,
                duration: buffer.duration(),
            });
        }
        Ok(())
    }

    /// Fail if the segment rounds to zero samples at `rate`
    pub fn check_nonempty(&self, rate: u32) -> Result<()> {
        if self.range(rate) == 0 {
            return Err(AugmentError::EmptySegment {
                begin: self.begin,
                end: self.end,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for TimeSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn buffer(len: usize, rate: u32) -> SampleBuffer {
        SampleBuffer::from_samples(vec![0.1; len], rate).unwrap()
    }

    #[test_case(1.0, 1.0 ; "zero length")]
    #[test_case(2.0, 1.0 ; "reversed")]
    #[test_case(-0.5, 1.0 ; "negative begin")]
    fn test_invalid_segments(begin: f64, end: f64) {
        assert!(matches!(
            TimeSegment::new(begin, end),
            Err(AugmentError::EmptySegment { .. })
        ));
    }

    #[test]
    fn test_end_of_buffer_is_complete() {
        let buf = buffer(16000, 16000);
        let segment = TimeSegment::resolve(0.0, SegmentEnd::EndOfBuffer, &buf).unwrap();
        assert!(segment.is_complete());
        assert_eq!(segment.end(), 1.0);
        assert_eq!(segment.range(16000), 16000);
    }

    #[test]
    fn test_explicit_full_range_is_complete() {
        let buf = buffer(100, 100);
        let segment = TimeSegment::resolve(0.0, SegmentEnd::At(1.0), &buf).unwrap();
        assert!(segment.is_complete());
        let partial = TimeSegment::resolve(0.5, SegmentEnd::At(1.0), &buf).unwrap();
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_sample_range_rounds() {
        let segment = TimeSegment::new(0.0149, 0.0251).unwrap();
        assert_eq!(segment.to_sample_range(100), (1, 3));
        assert_eq!(segment.range(100), 2);
    }

    #[test]
    fn test_check_within() {
        let buf = buffer(100, 100);
        assert!(TimeSegment::new(0.5, 1.0).unwrap().check_within(&buf).is_ok());
        assert!(matches!(
            TimeSegment::new(0.5, 1.2).unwrap().check_within(&buf),
            Err(AugmentError::SegmentOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_check_nonempty_at_rate() {
        let segment = TimeSegment::new(0.0, 0.001).unwrap();
        assert!(segment.check_nonempty(100).is_err());
        assert!(segment.check_nonempty(16000).is_ok());
    }
}
