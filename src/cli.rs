use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelhouse")]
#[command(author, version, about = "Video streaming server with background multi-quality transcoding")]
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
    /// Start the streaming and upload server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Encode quality variants of a file in the foreground
    Transcode {
        /// Input video file
        #[arg(required = true)]
        input: PathBuf,

        /// Quality to produce; repeat for several (default: configured ladder)
        #[arg(short, long = "quality")]
        qualities: Vec<String>,

        /// Directory for the variants (default: next to the input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List the quality variants that exist for a file
    Qualities {
        /// Original video file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
