//! Run configuration
//!
//! `InjectionConfig` is read from a JSON file and then overridden by
//! command-line flags. Missing fields take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::io::BitDepth;
use crate::error::{AugmentError, Result};
use crate::pipeline::{OverwritePolicy, WriteOptions};

/// Default share of every speech file covered by noise, in percent
pub const DEFAULT_PERCENTAGE: f64 = 20.0;

fn default_percentage() -> f64 {
    DEFAULT_PERCENTAGE
}

fn default_workers() -> usize {
    1
}

fn default_write_recipe() -> bool {
    true
}

/// Settings for one noise-injection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Speech root, one directory per speaker
    #[serde(default)]
    pub speech_path: PathBuf,

    /// Noise root, audio files directly inside
    #[serde(default)]
    pub noise_path: PathBuf,

    /// Output root; speaker directories are mirrored below it
    #[serde(default)]
    pub save_path: PathBuf,

    #[serde(default = "default_percentage")]
    pub percentage: f64,

    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seed for window placement; random when absent
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub overwrite: OverwritePolicy,

    #[serde(default)]
    pub bit_depth: BitDepth,

    /// Write a JSON recipe next to every output
    #[serde(default = "default_write_recipe")]
    pub write_recipe: bool,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            speech_path: PathBuf::new(),
            noise_path: PathBuf::new(),
            save_path: PathBuf::new(),
            percentage: DEFAULT_PERCENTAGE,
            workers: default_workers(),
            seed: None,
            overwrite: OverwritePolicy::default(),
            bit_depth: BitDepth::default(),
            write_recipe: default_write_recipe(),
        }
    }
}

impl InjectionConfig {
    pub fn new(speech_path: &Path, noise_path: &Path, save_path: &Path) -> Self {
        Self {
            speech_path: speech_path.to_path_buf(),
            noise_path: noise_path.to_path_buf(),
            save_path: save_path.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AugmentError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check run-level settings before any file is touched
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.percentage) {
            return Err(AugmentError::InvalidPercentage {
                percentage: self.percentage,
            });
        }
        if self.workers == 0 {
            return Err(AugmentError::Config {
                reason: "workers must be at least 1".to_string(),
            });
        }
        for (name, path) in [
            ("speech_path", &self.speech_path),
            ("noise_path", &self.noise_path),
            ("save_path", &self.save_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(AugmentError::Config {
                    reason: format!("{} is not set", name),
                });
            }
        }
        Ok(())
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            prefix: String::new(),
            bit_depth: self.bit_depth,
            overwrite: self.overwrite,
            write_recipe: self.write_recipe,
        }
    }
}
