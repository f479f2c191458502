//! ClipStitch CLI: stitch, probe, and check video clips.
//!
//! Usage:
//!   clipstitch stitch <CLIPS>... [OPTIONS]   Stitch clips into one MP4
//!   clipstitch probe <CLIPS>...              Show clip metadata
//!   clipstitch check [CLIPS]...              Check device encode support

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "clipstitch",
    about = "Stitch video clips and a soundtrack into one MP4",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stitch clips, in order, into one MP4
    Stitch {
        /// Clips in output order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Soundtrack laid under the whole output
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Audio offset in seconds (negative skips into the audio)
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        offset: f64,

        /// Audio fade-in in seconds
        #[arg(long, default_value = "0.0")]
        fade_in: f64,

        /// Audio fade-out in seconds
        #[arg(long, default_value = "0.0")]
        fade_out: f64,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the output frame rate
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Show per-clip metadata and the aggregate
    Probe {
        /// Clips to probe
        #[arg(required = true)]
        clips: Vec<PathBuf>,
    },

    /// Check that this device can encode the stitched output
    Check {
        /// Clips the output would be built from
        clips: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = clipstitch_common::config::AppConfig::load();

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipstitch_common::logging::init_logging(&config.logging);
    tracing::debug!(frame_rate = config.stitch.frame_rate, "Configuration loaded");

    match cli.command {
        Commands::Stitch {
            clips,
            audio,
            offset,
            fade_in,
            fade_out,
            output,
            fps,
        } => {
            if let Some(fps) = fps {
                config.stitch.frame_rate = fps;
            }
            commands::stitch::run(
                &config,
                clips,
                audio,
                commands::stitch::AudioArgs {
                    offset,
                    fade_in,
                    fade_out,
                },
                output,
            )
            .await
        }
        Commands::Probe { clips } => commands::probe::run(&config, clips).await,
        Commands::Check { clips } => commands::check::run(&config, clips).await,
    }
}
