//! Test fixtures wiring the core components over a temporary vault.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use yamanaka_core::{
    Broadcaster, ClientRegistry, EventSpool, GitHistory, HistoryStore, VaultStore,
};

/// A fully wired vault in a temporary directory, removed on drop.
pub struct TestVault {
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
    /// The vault store.
    pub vault: Arc<VaultStore>,
    /// Device membership.
    pub registry: Arc<ClientRegistry>,
    /// Per-device backlogs.
    pub spool: Arc<EventSpool>,
    /// Event fan-out over the registry and spool above.
    pub broadcaster: Broadcaster,
    /// Git-backed snapshot store, already initialized.
    pub history: Arc<GitHistory>,
}

impl TestVault {
    /// Creates a fresh vault with every component wired.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let root = temp_dir.path();

        let vault = Arc::new(VaultStore::open(root).expect("failed to open vault"));
        let history = Arc::new(GitHistory::new(root));
        history
            .ensure_initialized()
            .expect("failed to initialize history");
        let registry = Arc::new(ClientRegistry::load(root));
        let spool = Arc::new(EventSpool::new(root));
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&spool));

        Self {
            _temp_dir: temp_dir,
            vault,
            registry,
            spool,
            broadcaster,
            history,
        }
    }

    /// Returns the vault root path.
    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }
}

impl Default for TestVault {
    fn default() -> Self {
        Self::new()
    }
}
