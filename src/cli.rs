use clap::{Parser, Subcommand};
use skygrab::assemble::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skygrab")]
#[command(author, version, about = "Bluesky video download service")]
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
    /// Start the download server
    Start {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,
    },

    /// Download one post from the command line
    Fetch {
        /// Bluesky post URL
        #[arg(required = true)]
        url: String,

        /// Rendition to download, as WxH
        #[arg(short, long)]
        resolution: String,

        /// Output container
        #[arg(short, long, default_value = "mp4")]
        format: OutputFormat,
    },

    /// Show a post's metadata and available renditions
    Probe {
        /// Bluesky post URL
        #[arg(required = true)]
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
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
