//! History snapshots of the vault.
//!
//! Snapshots exist purely for recovery: nothing about them (not even the
//! snapshot id) is ever exposed to clients. The seam is the [`HistoryStore`]
//! trait; the shipped implementation commits the vault into a local git
//! repository.

use crate::error::{CoreError, CoreResult};
use crate::vault::VaultStore;
use git2::{IndexAddOption, Repository, Signature, StatusOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

/// A durable, content-addressed store of vault states.
///
/// Implementations are blocking; callers run them on the blocking pool while
/// holding the vault's exclusive lock.
pub trait HistoryStore: Send + Sync {
    /// Prepares the store at startup (idempotent).
    fn ensure_initialized(&self) -> CoreResult<()>;

    /// Commits the current vault state.
    ///
    /// Returns `Ok(None)` when nothing changed since the last snapshot.
    fn commit(&self, message: &str) -> CoreResult<Option<String>>;
}

/// Names the server's own bookkeeping so it never lands in a snapshot.
const EXCLUDED_FROM_HISTORY: &str = "/missed_events/\n/clients.json\n/LOCK\n";

/// Git-backed history store.
pub struct GitHistory {
    workdir: PathBuf,
}

impl GitHistory {
    /// Creates a history store rooted at the vault directory.
    pub fn new(vault_root: &Path) -> Self {
        Self {
            workdir: vault_root.to_path_buf(),
        }
    }

    fn signature() -> CoreResult<Signature<'static>> {
        Ok(Signature::now("yamanaka-server", "server@yamanaka.local")?)
    }
}

impl HistoryStore for GitHistory {
    fn ensure_initialized(&self) -> CoreResult<()> {
        let repo = match Repository::open(&self.workdir) {
            Ok(repo) => repo,
            Err(_) => Repository::init(&self.workdir)?,
        };

        let exclude = repo.path().join("info").join("exclude");
        if let Some(parent) = exclude.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&exclude, EXCLUDED_FROM_HISTORY)?;

        Ok(())
    }

    fn commit(&self, message: &str) -> CoreResult<Option<String>> {
        let repo = Repository::open(&self.workdir)?;

        let mut status_opts = StatusOptions::new();
        status_opts
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut status_opts))?;
        if statuses.is_empty() {
            return Ok(None);
        }

        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let signature = Self::signature()?;

        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| repo.find_commit(oid).ok());
        let parents: Vec<_> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        Ok(Some(oid.to_string()))
    }
}

/// Commits the vault under its exclusive lock.
///
/// The guard is held by the awaiting task while the commit itself runs on
/// the blocking pool, so no mutation can interleave with the snapshot.
pub async fn snapshot(
    vault: &VaultStore,
    history: Arc<dyn HistoryStore>,
    message: String,
) -> CoreResult<Option<String>> {
    let _guard = vault.exclusive().await;
    task::spawn_blocking(move || history.commit(&message))
        .await
        .map_err(|e| CoreError::internal(format!("snapshot task failed: {e}")))?
}
