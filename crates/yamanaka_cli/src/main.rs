//! Yamanaka sync server binary.
//!
//! Serves one vault to any number of devices: incremental pushes, full
//! pulls, tar-gz initial replaces, and a per-device event stream.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use yamanaka_server::ServerConfig;

/// Self-hosted synchronization server for a personal note vault.
#[derive(Parser)]
#[command(name = "yamanaka-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Vault root directory
    #[arg(long, default_value = "./data")]
    root_dir: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Seconds between automatic history snapshots
    #[arg(long, default_value_t = 21_600)]
    snapshot_interval_secs: u64,

    /// Spooled-event count above which a reconnecting device is told to
    /// full-sync instead of replaying its backlog
    #[arg(long, default_value_t = 10)]
    resync_threshold: usize,

    /// Seconds between keep-alive comments on idle event streams
    #[arg(long, default_value_t = 120)]
    heartbeat_secs: u64,

    /// Origin allowed to call the API from the editor
    #[arg(long, default_value = "app://obsidian.md")]
    allowed_origin: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::new(cli.root_dir)
        .with_listen_addr(cli.listen)
        .with_snapshot_interval(Duration::from_secs(cli.snapshot_interval_secs))
        .with_resync_threshold(cli.resync_threshold)
        .with_heartbeat_interval(Duration::from_secs(cli.heartbeat_secs))
        .with_allowed_origin(cli.allowed_origin);

    yamanaka_server::run(config).await
}
