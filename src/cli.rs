use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidwall")]
#[command(author, version, about = "Live-wallpaper media engine: manages bundled download/transcode tools")]
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
    /// Show availability of the bundled tools
    Status,

    /// Locate the bundled tools and repair quarantine/execute permissions
    Setup,

    /// Print a plain-text diagnostic report for the tool set
    Doctor,

    /// Launch each tool with its version flag and classify the result
    TestTools,

    /// Probe a media file and print its duration
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Download a video with the bundled downloader
    Fetch {
        /// Source URL
        #[arg(required = true)]
        url: String,

        /// Destination directory
        #[arg(short, long, default_value = ".")]
        dest: PathBuf,

        /// Extra arguments passed through to the downloader
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Transcode a file, showing live progress
    Convert {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Output file
        #[arg(required = true)]
        output: PathBuf,

        /// Extra arguments passed through to the transcoder
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Display version information
    Version,
}
