//! Shared state wiring the core components together.

use crate::config::ServerConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};
use yamanaka_core::{
    snapshot, Broadcaster, ClientRegistry, CoreResult, EventSpool, GitHistory, HistoryStore,
    VaultStore,
};

/// Dependencies shared by every request handler.
pub struct SyncContext {
    /// Runtime configuration.
    pub config: ServerConfig,
    /// The on-disk vault.
    pub vault: Arc<VaultStore>,
    /// Device membership.
    pub registry: Arc<ClientRegistry>,
    /// Per-device offline backlogs.
    pub spool: Arc<EventSpool>,
    /// Event fan-out.
    pub broadcaster: Broadcaster,
    /// Snapshot store.
    pub history: Arc<dyn HistoryStore>,
}

impl SyncContext {
    /// Opens the vault and wires every component.
    ///
    /// Creates the vault root if missing and initializes the history store
    /// before anything can mutate the tree.
    pub fn open(config: ServerConfig) -> CoreResult<Arc<Self>> {
        let vault = Arc::new(VaultStore::open(&config.root_dir)?);

        let history: Arc<dyn HistoryStore> = Arc::new(GitHistory::new(&config.root_dir));
        history.ensure_initialized()?;

        let registry = Arc::new(ClientRegistry::load(&config.root_dir));
        let spool = Arc::new(EventSpool::new(&config.root_dir));
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&spool));

        info!(root = %config.root_dir.display(), "vault ready");
        Ok(Arc::new(Self {
            config,
            vault,
            registry,
            spool,
            broadcaster,
            history,
        }))
    }

    /// Commits a history snapshot, logging the outcome.
    ///
    /// Failures are logged and swallowed: snapshots are a recovery aid and
    /// must never fail the mutation that triggered them.
    pub async fn snapshot(&self, message: &str) {
        match snapshot(&self.vault, Arc::clone(&self.history), message.to_string()).await {
            Ok(Some(id)) => info!(snapshot = %id, message, "vault snapshot committed"),
            Ok(None) => debug!(message, "no changes to snapshot"),
            Err(err) => warn!(%err, message, "vault snapshot failed"),
        }
    }
}
