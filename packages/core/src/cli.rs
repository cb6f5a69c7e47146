use std::path::PathBuf;

use clap::Parser;

/// Sports feed poller CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "sports-feed-poller",
    version,
    about = "Polls sports data providers and delivers merged scores and odds"
)]
pub struct Cli {
    /// Path to the JSON feed configuration (providers, tasks, intervals)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Scheduler tick in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Down-provider probe interval in seconds
    #[arg(long)]
    pub probe_interval: Option<u64>,
}
