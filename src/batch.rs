//! Pitch batch
//!
//! Applies a list of whole-file pitch shifts to every file of a speech
//! corpus. Each shift writes its own copy, prefixed `pitch_<shift>_`.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::corpus::{self, CorpusEntry};
use crate::dsp::{EffectSpec, PitchParams, MAX_PITCH_SHIFT_CENTS};
use crate::error::Result;
use crate::pipeline::{Audio, WriteOptions};

/// Summary of one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Outputs written
    pub processed: usize,
    /// File and shift pairs that failed
    pub failed: usize,
    pub written: Vec<PathBuf>,
}

/// Parse a comma-separated list of shifts in cents
pub fn parse_shifts(list: &str) -> std::result::Result<Vec<f64>, String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<f64>() {
            Ok(shift) if shift.abs() <= MAX_PITCH_SHIFT_CENTS => Ok(shift),
            Ok(_) => Err(format!("'{}' is outside ±{} cents", s, MAX_PITCH_SHIFT_CENTS)),
            Err(_) => Err(format!("'{}' is not a pitch shift", s)),
        })
        .collect()
}

fn pitch_file(entry: &CorpusEntry, shift: f64, save: &Path, options: &WriteOptions) -> Result<PathBuf> {
    let audio = Audio::load(&entry.path)?;
    let effect = EffectSpec::Pitch(PitchParams {
        shift,
        ..PitchParams::default()
    });
    let shifted = audio.apply_effect(&effect, None)?;

    let options = WriteOptions {
        prefix: format!("{}pitch_{}_", options.prefix, shift),
        ..options.clone()
    };
    Ok(shifted.write(&save.join(&entry.speaker), &options)?.audio)
}

/// Write one pitch-shifted copy of every speech file per shift
pub fn pitch_corpus(dataset: &Path, save: &Path, shifts: &[f64], options: &WriteOptions) -> Result<BatchReport> {
    let entries = corpus::speech_files(dataset)?;
    info!(
        "Pitch shifting {} files by {:?} cents into {}",
        entries.len(),
        shifts,
        save.display()
    );

    let mut report = BatchReport::default();
    for &shift in shifts {
        for entry in &entries {
            match pitch_file(entry, shift, save, options) {
                Ok(path) => {
                    report.processed += 1;
                    report.written.push(path);
                }
                Err(e) => {
                    warn!(
                        "Speaker {}: pitch {} failed for {}: {}",
                        entry.speaker,
                        shift,
                        entry.path.display(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        "Pitch batch finished: {} written, {} failed",
        report.processed, report.failed
    );
    Ok(report)
}
