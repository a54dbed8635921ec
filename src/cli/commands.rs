//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use super::InjectArgs;
use crate::batch;
use crate::config::InjectionConfig;
use crate::dsp::EffectSpec;
use crate::engine::io::BitDepth;
use crate::engine::segment::SegmentEnd;
use crate::error::{AugmentError, Result};
use crate::injection::inject_corpus;
use crate::pipeline::{Audio, OverwritePolicy, StepParams, WriteOptions, WrittenFiles};

/// Build the run configuration: config file first, then flags on top.
pub fn resolve_config(args: &InjectArgs) -> Result<InjectionConfig> {
    let mut config = match &args.config {
        Some(path) => InjectionConfig::from_file(path)?,
        None => InjectionConfig::default(),
    };

    if let Some(path) = &args.dataset_path {
        config.speech_path = path.clone();
    }
    if let Some(path) = &args.noise_path {
        config.noise_path = path.clone();
    }
    if let Some(path) = &args.save_path {
        config.save_path = path.clone();
    }
    if let Some(percentage) = args.percentage {
        config.percentage = percentage;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(bits) = args.bit_depth {
        config.bit_depth = BitDepth::try_from(bits)?;
    }
    if args.versioned {
        config.overwrite = OverwritePolicy::Versioned;
    }
    if args.no_recipe {
        config.write_recipe = false;
    }
    Ok(config)
}

/// Inject noise into a speech corpus.
pub fn inject(args: &InjectArgs) -> Result<()> {
    let config = resolve_config(args)?;
    // No signal handler; Ctrl-C ends the process and keeps finished outputs
    let cancel = Arc::new(AtomicBool::new(false));

    let report = inject_corpus(&config, cancel)?;

    println!("Noise injection complete");
    println!("  Written: {}", report.processed);
    println!("  Skipped: {}", report.skipped);
    println!("  Failed:  {}", report.failed);
    println!("  Output:  {}", config.save_path.display());

    Ok(())
}

/// Write pitch-shifted copies of a speech corpus.
pub fn pitch(dataset: &Path, save: &Path, pitch_list: &str) -> Result<()> {
    let shifts = batch::parse_shifts(pitch_list).map_err(|reason| AugmentError::Config { reason })?;
    if shifts.is_empty() {
        return Err(AugmentError::Config {
            reason: "pitch list is empty".to_string(),
        });
    }

    let report = batch::pitch_corpus(dataset, save, &shifts, &WriteOptions::default())?;

    println!("Pitch batch complete");
    println!("  Written: {}", report.processed);
    println!("  Failed:  {}", report.failed);

    Ok(())
}

/// Apply a single effect to a single file and write the result.
pub fn apply_effect(
    input: &Path,
    kind: &str,
    params: &str,
    begin: Option<f64>,
    end: Option<f64>,
    out: &Path,
) -> Result<WrittenFiles> {
    info!("Applying {} to {}", kind, input.display());

    let params: StepParams = serde_json::from_str(params)?;
    let effect = EffectSpec::from_params(kind, &params)?;

    let audio = Audio::load(input)?;
    let segment = match (begin, end) {
        (None, None) => None,
        (begin, end) => Some(audio.segment(
            begin.unwrap_or(0.0),
            end.map(SegmentEnd::At).unwrap_or(SegmentEnd::EndOfBuffer),
        )?),
    };

    let processed = audio.apply_effect(&effect, segment.as_ref())?;
    processed.write(out, &WriteOptions::default())
}

/// CLI wrapper around `apply_effect` that reports the written paths.
pub fn effect(
    input: &Path,
    kind: &str,
    params: &str,
    begin: Option<f64>,
    end: Option<f64>,
    out: &Path,
) -> Result<()> {
    let written = apply_effect(input, kind, params, begin, end, out)?;

    println!("Effect applied: {}", kind);
    println!("  Audio:  {}", written.audio.display());
    if let Some(recipe) = &written.recipe {
        println!("  Recipe: {}", recipe.display());
    }

    Ok(())
}
