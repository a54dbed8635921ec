//! Sample Buffer Management
//!
//! Provides the mono sample buffer every pipeline value is built on.
//! Sample storage is reference counted: cloning a buffer is O(1), and the
//! first mutation of shared storage copies it (copy-on-write).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::io;
use crate::engine::segment::TimeSegment;
use crate::error::{AugmentError, Result};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Peak absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Mono audio buffer with its sampling rate and source identity
///
/// The duration is always derived from the sample count, so the two can
/// never disagree.
///
/// # Example
/// ```
/// use augmenta::engine::SampleBuffer;
///
/// let buffer = SampleBuffer::from_samples(vec![0.0; 16000], 16000).unwrap();
/// assert_eq!(buffer.len(), 16000);
/// assert!((buffer.duration() - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<Vec<f32>>,
    sampling_rate: u32,
    source: Option<PathBuf>,
    /// Peak is known to be exactly 1; cleared by any sample mutation
    normalized: bool,
}

impl SampleBuffer {
    /// Create a buffer from in-memory samples with an optional source path
    pub fn new(samples: Vec<f32>, sampling_rate: u32, source: Option<PathBuf>) -> Result<Self> {
        if sampling_rate == 0 {
            return Err(AugmentError::InvalidSampleRate {
                rate: sampling_rate,
            });
        }
        Ok(Self {
            samples: Arc::new(samples),
            sampling_rate,
            source,
            normalized: false,
        })
    }

    /// Create an anonymous in-memory buffer
    pub fn from_samples(samples: Vec<f32>, sampling_rate: u32) -> Result<Self> {
        Self::new(samples, sampling_rate, None)
    }

    /// Decode an audio file into a mono buffer at its native rate
    pub fn load(path: &Path) -> Result<Self> {
        let (samples, sampling_rate) = io::decode_mono(path)?;
        Self::new(samples, sampling_rate, Some(path.to_path_buf()))
    }

    /// Derive a buffer with new samples that keeps this buffer's rate and source
    pub(crate) fn with_samples(&self, samples: Vec<f32>) -> Self {
        Self {
            samples: Arc::new(samples),
            sampling_rate: self.sampling_rate,
            source: self.source.clone(),
            normalized: false,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    #[inline]
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sampling_rate as f64
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Identity recorded in recipes: the source path, or `<memory>`
    pub fn source_id(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    /// Whether two buffers share the same sample storage
    pub fn shares_storage_with(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Mutable access to the samples, copying shared storage first
    fn samples_mut(&mut self) -> &mut Vec<f32> {
        self.normalized = false;
        Arc::make_mut(&mut self.samples)
    }

    // ------------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------------

    /// Convert to another sampling rate (no-op when already there)
    pub fn resample(&self, target_rate: u32) -> Result<Self> {
        if target_rate == 0 {
            return Err(AugmentError::InvalidSampleRate { rate: target_rate });
        }
        if target_rate == self.sampling_rate {
            return Ok(self.clone());
        }
        let ratio = target_rate as f64 / self.sampling_rate as f64;
        Ok(Self {
            samples: Arc::new(io::resample_linear(&self.samples, ratio)),
            sampling_rate: target_rate,
            source: self.source.clone(),
            normalized: false,
        })
    }

    /// Samples covered by `segment`, clamped to the buffer length
    pub fn slice(&self, segment: &TimeSegment) -> Self {
        let (begin, end) = segment.to_sample_range(self.sampling_rate);
        let end = end.min(self.len());
        let begin = begin.min(end);
        if begin == 0 && end == self.len() {
            return self.clone();
        }
        self.with_samples(self.samples[begin..end].to_vec())
    }

    /// Keep only the first `len` samples
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            self.samples_mut().truncate(len);
        }
    }

    /// Zero-extend on both sides
    pub fn pad(&mut self, left: usize, right: usize) {
        if left == 0 && right == 0 {
            return;
        }
        let mut padded = Vec::with_capacity(left + self.len() + right);
        padded.resize(left, 0.0);
        padded.extend_from_slice(&self.samples);
        padded.resize(left + self.len() + right, 0.0);
        self.samples = Arc::new(padded);
    }

    /// Repeat the sample array `times` times
    pub fn tile(&mut self, times: usize) {
        if times == 1 {
            return;
        }
        let tiled = self.samples.repeat(times);
        self.samples = Arc::new(tiled);
    }

    /// Scale so the peak absolute sample is exactly 1
    ///
    /// Division (not multiplication by a reciprocal) keeps the operation
    /// idempotent: a second pass sees a peak of exactly 1 and is a no-op.
    /// The result remembers it is normalised, so normalising it again (or
    /// a clone, pad or tile of it) skips the peak scan.
    pub fn normalize(&self) -> Result<Self> {
        if self.normalized {
            return Ok(self.clone());
        }
        let peak = self.peak();
        if peak == 0.0 || !peak.is_finite() {
            return Err(AugmentError::SilentSignal);
        }
        let mut normalized = if peak == 1.0 {
            self.clone()
        } else {
            self.with_samples(self.samples.iter().map(|s| s / peak).collect())
        };
        normalized.normalized = true;
        Ok(normalized)
    }

    /// Whether the peak is known to be exactly 1 without scanning
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Multiply every sample by `ratio`
    pub fn gain(&mut self, ratio: f32) {
        if ratio == 1.0 {
            return;
        }
        for sample in self.samples_mut().iter_mut() {
            *sample *= ratio;
        }
    }

    /// Elementwise sum with an equal-length buffer
    pub fn add_samples(&mut self, other: &[f32]) {
        for (sample, &o) in self.samples_mut().iter_mut().zip(other) {
            *sample += o;
        }
    }

    /// Zero the samples in `[begin, end)`, clamped to the buffer
    pub fn silence(&mut self, begin: usize, end: usize) {
        let end = end.min(self.len());
        if begin >= end {
            return;
        }
        self.samples_mut()[begin..end].fill(0.0);
    }

    /// This buffer's samples followed by `other`'s
    pub fn concat(&self, other: &SampleBuffer) -> Result<Self> {
        if other.sampling_rate != self.sampling_rate {
            return Err(AugmentError::SampleRateMismatch {
                expected: self.sampling_rate,
                actual: other.sampling_rate,
            });
        }
        let mut joined = Vec::with_capacity(self.len() + other.len());
        joined.extend_from_slice(&self.samples);
        joined.extend_from_slice(&other.samples);
        Ok(self.with_samples(joined))
    }

    // ------------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------------

    /// Peak absolute sample value (linear)
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// RMS level in dB; -inf for empty or silent buffers
    pub fn rms_db(&self) -> f32 {
        if self.is_empty() {
            return f32::NEG_INFINITY;
        }
        let sum_squares: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / self.len() as f64).sqrt() as f32;
        linear_to_db(rms)
    }

    /// Check that no sample is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

// ============================================================================
// Tests
// ============================================================================
