//! Audio pipeline value
//!
//! `Audio` wraps a sample buffer together with the buffer designated for
//! output, the recipe and the file-name suffix built from it. Every
//! operator returns a new value; earlier values are never touched.
//!
//! Structural operators (slice, resample, fit, align, gain, normalize) carry
//! the designated output, recipe and suffix forward. Value-producing
//! operators (add, concat, mix, apply_effect) designate their own buffer.
//! Only augmentations (mix, apply_effect) extend the recipe.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::buffer::SampleBuffer;
use crate::engine::io::{self, BitDepth};
use crate::engine::segment::{SegmentEnd, TimeSegment};
use crate::error::{AugmentError, Result};
use crate::pipeline::recipe::{Recipe, StepRecord};

/// How a signal is brought to a target length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FittingMethod {
    /// Zero-extend
    Padding,
    /// Repeat the signal, then truncate
    #[default]
    Looping,
}

impl FittingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            FittingMethod::Padding => "Padding",
            FittingMethod::Looping => "Looping",
        }
    }
}

/// What happens when an output file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the existing file
    #[default]
    Overwrite,
    /// Write `<name>_v<N>` with the first free N
    Versioned,
}

/// Options for `Audio::write`
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Prepended to the file stem
    pub prefix: String,
    pub bit_depth: BitDepth,
    pub overwrite: OverwritePolicy,
    /// Write the JSON recipe sidecar
    pub write_recipe: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            bit_depth: BitDepth::default(),
            overwrite: OverwritePolicy::default(),
            write_recipe: true,
        }
    }
}

/// Paths produced by one `write`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFiles {
    pub audio: PathBuf,
    pub recipe: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Audio {
    buffer: SampleBuffer,
    output: SampleBuffer,
    recipe: Recipe,
    suffix: String,
}

impl Audio {
    /// Fresh value: its own buffer is the output, recipe empty
    pub fn new(buffer: SampleBuffer) -> Self {
        Self {
            output: buffer.clone(),
            buffer,
            recipe: Recipe::new(),
            suffix: String::new(),
        }
    }

    /// Decode a file at its native rate
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(SampleBuffer::load(path)?))
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Buffer `write` persists
    pub fn output(&self) -> &SampleBuffer {
        &self.output
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// `|Tag` sequence appended to output file names
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn samples(&self) -> &[f32] {
        self.buffer.samples()
    }

    pub fn sampling_rate(&self) -> u32 {
        self.buffer.sampling_rate()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }

    pub fn source_id(&self) -> String {
        self.buffer.source_id()
    }

    /// Segment resolved against this value's buffer
    pub fn segment(&self, begin: f64, end: SegmentEnd) -> Result<TimeSegment> {
        TimeSegment::resolve(begin, end, &self.buffer)
    }

    // ------------------------------------------------------------------------
    // Fork helpers
    // ------------------------------------------------------------------------

    /// Structural fork: new buffer, same output, recipe and suffix
    pub(crate) fn fork(&self, buffer: SampleBuffer) -> Self {
        Self {
            buffer,
            output: self.output.clone(),
            recipe: self.recipe.clone(),
            suffix: self.suffix.clone(),
        }
    }

    /// Value fork: new buffer designated as output, history carried
    pub(crate) fn derive(&self, buffer: SampleBuffer) -> Self {
        Self {
            output: buffer.clone(),
            buffer,
            recipe: self.recipe.clone(),
            suffix: self.suffix.clone(),
        }
    }

    /// Append an augmentation step
    pub(crate) fn push_step(&mut self, record: StepRecord) {
        self.suffix.push('|');
        self.suffix.push_str(record.kind.as_str());
        self.recipe.push(record);
    }

    // ------------------------------------------------------------------------
    // Structural operators
    // ------------------------------------------------------------------------

    pub fn slice(&self, segment: &TimeSegment) -> Self {
        self.fork(self.buffer.slice(segment))
    }

    pub fn resample(&self, rate: u32) -> Result<Self> {
        Ok(self.fork(self.buffer.resample(rate)?))
    }

    /// Bring the buffer to exactly `length` samples
    pub fn fit_length(&self, length: usize, method: FittingMethod) -> Self {
        let current = self.len();
        if length == current {
            return self.clone();
        }

        let mut buffer = self.buffer.clone();
        if length < current {
            buffer.truncate(length);
        } else if method == FittingMethod::Looping && current > 0 {
            buffer.tile(length.div_ceil(current));
            buffer.truncate(length);
        } else {
            buffer.pad(0, length - current);
        }
        self.fork(buffer)
    }

    pub fn fit_duration(&self, seconds: f64, method: FittingMethod) -> Self {
        let length = (seconds.max(0.0) * self.sampling_rate() as f64).round() as usize;
        self.fit_length(length, method)
    }

    /// Place the buffer at `segment.begin` inside `segment.end` samples
    pub fn align(&self, segment: &TimeSegment) -> Self {
        let (begin, end) = segment.to_sample_range(self.sampling_rate());
        self.align_to(begin, end)
    }

    /// Zero-pad left by `begin` samples, then pad or cut to `total` samples
    pub(crate) fn align_to(&self, begin: usize, total: usize) -> Self {
        let mut buffer = self.buffer.clone();
        buffer.pad(begin, 0);
        if buffer.len() > total {
            buffer.truncate(total);
        } else {
            let missing = total - buffer.len();
            buffer.pad(0, missing);
        }
        self.fork(buffer)
    }

    pub fn gain(&self, ratio: f32) -> Self {
        let mut buffer = self.buffer.clone();
        buffer.gain(ratio);
        self.fork(buffer)
    }

    pub fn normalize(&self) -> Result<Self> {
        Ok(self.fork(self.buffer.normalize()?))
    }

    // ------------------------------------------------------------------------
    // Value-producing operators
    // ------------------------------------------------------------------------

    /// Elementwise sum after fitting `other` to this value's length
    pub fn add(&self, other: &Audio, method: FittingMethod) -> Result<Self> {
        if other.sampling_rate() != self.sampling_rate() {
            return Err(AugmentError::SampleRateMismatch {
                expected: self.sampling_rate(),
                actual: other.sampling_rate(),
            });
        }
        let fitted = other.fit_length(self.len(), method);
        let mut buffer = self.buffer.clone();
        buffer.add_samples(fitted.samples());
        Ok(self.derive(buffer))
    }

    pub fn concat(&self, other: &Audio) -> Result<Self> {
        Ok(self.derive(self.buffer.concat(&other.buffer)?))
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// File name without extension: `<prefix><stem><suffix>`
    pub fn output_name(&self, prefix: &str) -> String {
        let stem = self
            .output
            .source()
            .or_else(|| self.buffer.source())
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        format!("{}{}{}", prefix, stem, self.suffix)
    }

    /// Output extension; only WAV is encoded
    fn output_extension(&self) -> String {
        self.output
            .source()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .filter(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or("wav")
            .to_string()
    }

    /// Persist the output buffer and its recipe into `dir`
    pub fn write(&self, dir: &Path, options: &WriteOptions) -> Result<WrittenFiles> {
        fs::create_dir_all(dir)?;

        let mut name = self.output_name(&options.prefix);
        let extension = self.output_extension();
        if options.overwrite == OverwritePolicy::Versioned {
            name = next_free_name(dir, &name, &extension);
        }

        let audio_path = dir.join(format!("{}.{}", name, extension));
        io::write_wav(
            &audio_path,
            self.output.samples(),
            self.output.sampling_rate(),
            options.bit_depth,
        )?;

        let recipe_path = if options.write_recipe {
            let path = dir.join(format!("{}.json", name));
            fs::write(&path, self.recipe.to_json()?)?;
            Some(path)
        } else {
            None
        };

        debug!("Wrote {}", audio_path.display());
        Ok(WrittenFiles {
            audio: audio_path,
            recipe: recipe_path,
        })
    }
}

/// `name`, or `name_v<N>` with the smallest N whose file does not exist
fn next_free_name(dir: &Path, name: &str, extension: &str) -> String {
    if !dir.join(format!("{}.{}", name, extension)).exists() {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{}_v{}", name, n))
        .find(|candidate| !dir.join(format!("{}.{}", candidate, extension)).exists())
        .unwrap_or_else(|| name.to_string())
}
