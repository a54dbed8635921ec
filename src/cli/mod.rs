//! CLI Module
//!
//! Command-line interface for the augmentation tools.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Augmenta - speech dataset augmentation
#[derive(Parser, Debug)]
#[command(name = "augmenta")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mix a share of every speech file with noise
    #[command(name = "inject")]
    Inject(InjectArgs),

    /// Write pitch-shifted copies of every speech file
    #[command(name = "pitch")]
    Pitch {
        /// Speech root, one directory per speaker
        #[arg(long = "dataset-path", visible_alias = "dp")]
        dataset_path: PathBuf,

        /// Output root
        #[arg(long = "save-path", visible_alias = "sp")]
        save_path: PathBuf,

        /// Comma-separated shifts in cents, e.g. "200,-300"
        #[arg(long = "pitch-list", visible_alias = "pl", allow_hyphen_values = true)]
        pitch_list: String,
    },

    /// Apply one effect to one file
    #[command(name = "effect")]
    Effect {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Effect tag, e.g. Reverb or LowPass
        #[arg(short, long)]
        kind: String,

        /// Effect parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,

        /// Segment start in seconds
        #[arg(long)]
        begin: Option<f64>,

        /// Segment end in seconds; end of file when omitted
        #[arg(long)]
        end: Option<f64>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Flags of the inject command; each one overrides the config file
#[derive(Args, Debug, Default)]
pub struct InjectArgs {
    /// Speech root, one directory per speaker
    #[arg(long = "dataset-path", visible_alias = "dp")]
    pub dataset_path: Option<PathBuf>,

    /// Noise root, audio files directly inside
    #[arg(long = "noise-path", visible_alias = "np")]
    pub noise_path: Option<PathBuf>,

    /// Output root
    #[arg(long = "save-path", visible_alias = "sp")]
    pub save_path: Option<PathBuf>,

    /// Share of each file covered by noise, 0 to 100
    #[arg(short, long, allow_hyphen_values = true)]
    pub percentage: Option<f64>,

    /// Worker threads
    #[arg(long = "worker-count", visible_alias = "wo")]
    pub workers: Option<usize>,

    /// Seed for reproducible window placement
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output bit depth: 16, 24 or 32 (float)
    #[arg(long)]
    pub bit_depth: Option<u16>,

    /// Never replace existing outputs; write versioned names instead
    #[arg(long)]
    pub versioned: bool,

    /// Skip the JSON recipe sidecars
    #[arg(long)]
    pub no_recipe: bool,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_flags() {
        let cli = Cli::try_parse_from([
            "augmenta", "inject", "--dp", "/speech", "--np", "/noise", "--sp", "/out", "-p", "35",
            "--wo", "4", "--seed", "9",
        ])
        .unwrap();
        match cli.command {
            Commands::Inject(args) => {
                assert_eq!(args.dataset_path, Some(PathBuf::from("/speech")));
                assert_eq!(args.percentage, Some(35.0));
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.seed, Some(9));
                assert!(!args.versioned);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_pitch_list_with_negative_shift() {
        let cli = Cli::try_parse_from([
            "augmenta", "-v", "pitch", "--dp", "/speech", "--sp", "/out", "--pl", "-300,200",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Pitch { pitch_list, .. } => assert_eq!(pitch_list, "-300,200"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_effect_defaults() {
        let cli = Cli::try_parse_from([
            "augmenta", "effect", "-i", "a.wav", "-k", "Reverb", "-o", "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Effect { params, begin, end, .. } => {
                assert_eq!(params, "{}");
                assert!(begin.is_none() && end.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
