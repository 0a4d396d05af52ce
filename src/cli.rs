//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "guidegen",
    about = "Generates M3U playlists, XMLTV guides and JSON channel records from upstream catalog/EPG feeds",
    version
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "guidegen.json")]
    pub config: PathBuf,

    /// Restrict the run to these market codes (default: every configured market)
    #[arg(short, long)]
    pub market: Vec<String>,

    /// Output directory, overriding the configured one
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip per-channel stream resolution even when an endpoint is configured
    #[arg(long)]
    pub no_streams: bool,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}
