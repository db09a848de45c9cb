use clap::{Parser, Subcommand};
use siasplit_core::QualityProfile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "siasplit")]
#[command(author, version, about = "Split videos into HLS bundles and publish them to object storage")]
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
    /// Transcode a video into one HLS variant per quality plus a master playlist
    Split {
        /// Source video
        #[arg(required = true)]
        input: PathBuf,

        /// Quality to produce (240p, 360p, 480p, 720p, 1080p, Source); repeatable
        #[arg(short, long = "quality", required = true, num_args = 1..)]
        qualities: Vec<QualityProfile>,

        /// Native frame width (probed when omitted)
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Native frame height (probed when omitted)
        #[arg(long, requires = "width")]
        height: Option<u32>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Upload the output directory into a new bucket and print the playlist URL
    Upload {
        /// S3-compatible endpoint (overrides config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Public base URL for the published link (overrides config)
        #[arg(long)]
        host_url: Option<String>,

        /// Access key (overrides config)
        #[arg(long, env = "SIASPLIT_ACCESS_KEY")]
        access_key: Option<String>,

        /// Secret key (overrides config)
        #[arg(long, env = "SIASPLIT_SECRET_KEY", hide_env_values = true)]
        secret_key: Option<String>,

        /// Directory to upload (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// List the available qualities and their encoding targets
    Qualities,
}
