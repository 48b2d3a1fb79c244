use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelhouse")]
#[command(author, version, about = "Personal media server with on-demand remux, transcode and HLS streaming")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the media tree over HTTP
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Media root directory (overrides config)
        #[arg(short, long)]
        media_root: Option<PathBuf>,
    },

    /// Generate HLS output ahead of time for sources that need remuxing
    Pregen {
        /// Directory to scan (defaults to the configured media root)
        dir: Option<PathBuf>,

        /// Regenerate even when a valid playlist exists
        #[arg(long)]
        force: bool,

        /// Skip files whose relative path contains PATTERN (case-insensitive, repeatable)
        #[arg(long = "skip", value_name = "PATTERN")]
        skip: Vec<String>,

        /// Number of files to encode at once
        #[arg(long, default_value = "1")]
        parallel: usize,

        /// Only report what would be generated
        #[arg(long)]
        dry_run: bool,

        /// Per-file deadline in minutes
        #[arg(long, value_name = "MINUTES")]
        timeout: Option<u64>,
    },

    /// Probe a media file and display codec, duration and subtitle tracks
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Convert every .srt sidecar lacking a .vtt into WebVTT
    ConvertSubs {
        /// Directory to scan (defaults to the configured media root)
        dir: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Display version information
    Version,
}
