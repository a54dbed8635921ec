//! Noise reservoir
//!
//! All noise files, resampled to one rate, concatenated and normalised into a
//! single buffer with a read cursor. Every speech file at that rate draws its
//! noise from the cursor onwards; the cursor wraps to the start when the
//! reservoir is exhausted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::corpus;
use crate::engine::buffer::SampleBuffer;
use crate::engine::segment::TimeSegment;
use crate::error::{AugmentError, Result};
use crate::pipeline::Audio;

/// A half-open sample range `[start, end)` of the reservoir
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseWindow {
    pub start: usize,
    pub end: usize,
}

impl NoiseWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Same range expressed in seconds at `rate`
    pub fn to_segment(&self, rate: u32) -> Result<TimeSegment> {
        let rate = rate as f64;
        TimeSegment::new(self.start as f64 / rate, self.end as f64 / rate)
    }
}

pub struct NoiseReservoir {
    audio: Audio,
    cursor: AtomicUsize,
}

impl NoiseReservoir {
    /// Wrap `buffer`, normalised, with the cursor at 0
    pub fn from_buffer(buffer: SampleBuffer) -> Result<Self> {
        Ok(Self {
            audio: Audio::new(buffer.normalize()?),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Reservoir contents as a pipeline value, shared without copying
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn sampling_rate(&self) -> u32 {
        self.audio.sampling_rate()
    }

    /// Total length in samples
    pub fn total(&self) -> usize {
        self.audio.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn cursor_seconds(&self) -> f64 {
        self.cursor() as f64 / self.sampling_rate() as f64
    }

    #[cfg(test)]
    pub(crate) fn set_cursor(&self, position: usize) {
        self.cursor.store(position % self.total().max(1), Ordering::SeqCst);
    }

    /// Claim `samples` samples from the cursor onwards
    ///
    /// The claim is atomic, so concurrent callers get disjoint ranges of the
    /// cycle. The returned windows are split at the wrap point and their
    /// lengths sum to `samples`; a request longer than the reservoir wraps
    /// more than once.
    pub fn reserve(&self, samples: usize) -> Vec<NoiseWindow> {
        let total = self.total();
        if samples == 0 || total == 0 {
            return Vec::new();
        }

        let start = match self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                Some((cursor + samples % total) % total)
            }) {
            Ok(previous) | Err(previous) => previous,
        };

        let mut windows = Vec::new();
        let mut position = start;
        let mut remaining = samples;
        while remaining > 0 {
            let len = remaining.min(total - position);
            windows.push(NoiseWindow {
                start: position,
                end: position + len,
            });
            remaining -= len;
            position = (position + len) % total;
        }

        if windows.len() > 1 {
            debug!(
                "Noise reservoir at {} Hz wrapped: {} windows from sample {}",
                self.sampling_rate(),
                windows.len(),
                start
            );
        }
        windows
    }
}

/// Reservoirs of one noise corpus, built lazily per sampling rate
pub struct ReservoirRegistry {
    noise_root: PathBuf,
    files: Vec<PathBuf>,
    reservoirs: Mutex<HashMap<u32, Arc<NoiseReservoir>>>,
}

impl ReservoirRegistry {
    /// Index the noise files under `noise_root`
    pub fn new(noise_root: &Path) -> Result<Self> {
        let files = corpus::noise_files(noise_root)?;
        if files.is_empty() {
            return Err(AugmentError::NoNoiseSources {
                path: noise_root.display().to_string(),
            });
        }
        Ok(Self {
            noise_root: noise_root.to_path_buf(),
            files,
            reservoirs: Mutex::new(HashMap::new()),
        })
    }

    /// Reservoir for `rate`, building it on first use
    pub fn get_or_build(&self, rate: u32) -> Result<Arc<NoiseReservoir>> {
        let mut reservoirs = self
            .reservoirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(reservoir) = reservoirs.get(&rate) {
            return Ok(Arc::clone(reservoir));
        }

        let reservoir = Arc::new(self.build(rate)?);
        reservoirs.insert(rate, Arc::clone(&reservoir));
        Ok(reservoir)
    }

    fn build(&self, rate: u32) -> Result<NoiseReservoir> {
        let mut samples = Vec::new();
        let mut used = 0usize;
        for path in &self.files {
            match SampleBuffer::load(path).and_then(|b| b.resample(rate)) {
                Ok(buffer) => {
                    samples.extend_from_slice(buffer.samples());
                    used += 1;
                }
                Err(e) => warn!("Skipping noise file {}: {}", path.display(), e),
            }
        }

        let no_sources = || AugmentError::NoNoiseSources {
            path: self.noise_root.display().to_string(),
        };
        if used == 0 {
            return Err(no_sources());
        }

        let buffer = SampleBuffer::new(samples, rate, Some(self.noise_root.clone()))?;
        let reservoir = NoiseReservoir::from_buffer(buffer).map_err(|_| no_sources())?;
        info!(
            "Built noise reservoir at {} Hz from {} files ({:.1}s)",
            rate,
            used,
            reservoir.audio().duration()
        );
        Ok(reservoir)
    }

    /// Rates with a built reservoir
    pub fn rates(&self) -> Vec<u32> {
        let reservoirs = self
            .reservoirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut rates: Vec<u32> = reservoirs.keys().copied().collect();
        rates.sort_unstable();
        rates
    }
}
