//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Vault root directory.
    pub root_dir: PathBuf,
    /// Address to bind to.
    pub listen_addr: SocketAddr,
    /// Time between automatic history snapshots.
    pub snapshot_interval: Duration,
    /// Spooled-event count above which a reconnecting subscriber is told to
    /// full-sync instead of replaying the backlog.
    pub resync_threshold: usize,
    /// Time between keep-alive comments on idle event streams.
    pub heartbeat_interval: Duration,
    /// Origin allowed to call the API from the editor.
    pub allowed_origin: String,
}

impl ServerConfig {
    /// Creates a configuration for the given vault root with defaults for
    /// everything else.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            snapshot_interval: Duration::from_secs(6 * 60 * 60),
            resync_threshold: 10,
            heartbeat_interval: Duration::from_secs(120),
            allowed_origin: "app://obsidian.md".to_string(),
        }
    }

    /// Sets the listen address.
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    /// Sets the snapshot interval.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Sets the resync threshold.
    pub fn with_resync_threshold(mut self, threshold: usize) -> Self {
        self.resync_threshold = threshold;
        self
    }

    /// Sets the keep-alive interval.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the allowed CORS origin.
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("./data")
    }
}
