//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod args;
pub mod cache;
pub mod capture;
pub mod context;
pub mod health;
pub mod init;
pub mod recommend;
pub mod serve;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

use crate::capture::still::DEFAULT_STILL_COMMAND;

/// Med Mirror - see the future you your health data points to
#[derive(Parser, Debug)]
#[command(name = "med-mirror")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, json)
    #[arg(
        long,
        global = true,
        env = "MED_MIRROR_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "MED_MIRROR_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "MED_MIRROR_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Med Mirror configuration
    Init,

    /// Show configuration and cache status
    Status,

    /// Display version information
    Version,

    /// Run the prediction proxy server
    #[command(after_help = "EXAMPLES:\n  \
            med-mirror serve                      # 0.0.0.0:8000 by default\n  \
            med-mirror serve --port 9000\n  \
            OPENAI_API_KEY=sk-... med-mirror serve")]
    Serve {
        /// Interface to bind
        #[arg(long, env = "MED_MIRROR_HOST", hide_env = true)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long, short = 'p', env = "MED_MIRROR_PORT", hide_env = true)]
        port: Option<u16>,
    },

    /// Select an image file and cache it as the current photo
    Upload {
        /// Image file (jpeg, png, webp, ...)
        file: PathBuf,
    },

    /// Take a photo with the camera and cache it as the current photo
    Capture {
        /// Still-capture command to run
        #[arg(long, default_value = DEFAULT_STILL_COMMAND)]
        command: String,

        /// Also write the captured JPEG here
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Request a forecast image for the current photo
    #[command(after_help = "EXAMPLES:\n  \
            med-mirror predict --context patient.json\n  \
            med-mirror predict -c patient.json --image me.jpg -o future.png\n  \
            med-mirror predict -c patient.json --format json | jq .model_used")]
    Predict {
        /// Health context JSON file sent with the photo
        #[arg(long, short = 'c')]
        context: PathBuf,

        /// Use this image instead of the cached one
        #[arg(long, short = 'i')]
        image: Option<PathBuf>,

        /// Prediction proxy base URL
        #[arg(long, env = "MED_MIRROR_PROXY_URL", hide_env = true)]
        proxy: Option<String>,

        /// Where to write the forecast image
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Manage the locally cached photo
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Build a patient record from a Health app export
    #[command(after_help = "EXAMPLES:\n  \
            med-mirror import-health export.zip > patient.json\n  \
            med-mirror import-health export.zip -o patient.json\n  \
            med-mirror predict --context patient.json")]
    ImportHealth {
        /// The export.zip shared from the Health app
        file: PathBuf,

        /// Write the record here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Get lifestyle recommendations for a patient record
    Recommend {
        /// Patient record JSON file
        file: PathBuf,

        /// Recommendation service base URL
        #[arg(long, env = "MED_MIRROR_RECOMMENDATION_URL", hide_env = true)]
        url: Option<String>,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show the cached photo, if still fresh
    Show {
        /// Print the full data URL
        #[arg(long)]
        raw: bool,
    },
    /// Show storage statistics
    Status,
    /// Remove the cached photo
    Clear,
    /// Print cache directory path
    Path,
}

/// Format bytes as human-readable size
pub(crate) fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
