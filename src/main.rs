// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "photo-saver")]
#[command(about = "Finish and save camera captures in the background")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Saver configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output directory (overrides the configuration)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Finish a single JPEG capture and wait for it to be written
    Finish {
        /// Captured JPEG file
        input: PathBuf,

        #[command(flatten)]
        options: cli::FinishOptions,
    },

    /// Queue several captures for background saving
    Batch {
        /// Captured JPEG files, saved in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        options: cli::FinishOptions,
    },

    /// Write a synthetic raw sensor frame as DNG
    Dng(DngArgs),
}

#[derive(Args)]
struct DngArgs {
    /// Frame width in pixels
    #[arg(long, default_value = "64")]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value = "48")]
    height: u32,

    /// Significant bits per sample
    #[arg(long, default_value = "10")]
    bits: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=photo_saver=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref(), cli.output);

    match cli.command {
        Commands::Finish { input, options } => cli::finish(config, input, &options),
        Commands::Batch { inputs, options } => cli::batch(config, inputs, &options),
        Commands::Dng(args) => cli::write_dng(config, args.width, args.height, args.bits),
    }
}
