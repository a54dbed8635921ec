//! Augmenta CLI
//!
//! Command-line interface for speech dataset augmentation.

use clap::Parser;
use env_logger::Env;
use log::{debug, error};

use augmenta::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    debug!("Augmenta v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Inject(args) => commands::inject(&args),
        Commands::Pitch {
            dataset_path,
            save_path,
            pitch_list,
        } => commands::pitch(&dataset_path, &save_path, &pitch_list),
        Commands::Effect {
            input,
            kind,
            params,
            begin,
            end,
            out,
        } => commands::effect(&input, &kind, &params, begin, end, &out),
    };

    if let Err(e) = &result {
        error!("[{}] {}", e.error_code(), e);
        for hint in e.recovery_suggestions() {
            error!("  hint: {}", hint);
        }
    }
    Ok(result?)
}
