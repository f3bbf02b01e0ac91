//! Vault storage: all reads and writes of vault contents.
//!
//! The vault is a plain directory tree. A process-wide reader-writer lock
//! serializes mutations against each other and against history snapshots;
//! walks take the shared side. A few top-level names are reserved for the
//! server's own bookkeeping and are never listed nor writable through the
//! sync API:
//!
//! ```text
//! <root>/
//! ├─ .git/             # history store
//! ├─ missed_events/    # per-device offline backlogs
//! ├─ clients.json      # tracked-device roster
//! ├─ LOCK              # advisory single-process lock
//! └─ …                 # the user's vault files
//! ```

use crate::error::{CoreError, CoreResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use fs2::FileExt;
use std::fs::File as StdFile;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::task;
use tracing::warn;
use walkdir::WalkDir;
use yamanaka_protocol::VaultFile;

/// Directory holding the history store.
pub const HISTORY_DIR: &str = ".git";
/// Directory holding per-device missed-event queues.
pub const SPOOL_DIR: &str = "missed_events";
/// Persisted roster of every device that has ever connected.
pub const CLIENTS_FILE: &str = "clients.json";
/// Advisory lock held for the lifetime of the process.
const LOCK_FILE: &str = "LOCK";

const RESERVED_NAMES: [&str; 4] = [HISTORY_DIR, SPOOL_DIR, CLIENTS_FILE, LOCK_FILE];

/// Locked access to the vault directory.
///
/// Holding a `VaultStore` also holds an advisory file lock on the root, so
/// two server processes cannot operate on the same vault.
#[derive(Debug)]
pub struct VaultStore {
    root: PathBuf,
    lock: RwLock<()>,
    _lock_file: StdFile,
}

impl VaultStore {
    /// Opens the vault root, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::VaultLocked`] if another process holds the
    /// advisory lock.
    pub fn open(root: &Path) -> CoreResult<Self> {
        std::fs::create_dir_all(root)?;

        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::VaultLocked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            lock: RwLock::new(()),
            _lock_file: lock_file,
        })
    }

    /// Returns the vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquires the vault's exclusive lock.
    ///
    /// Used by the snapshotter so commits cannot interleave with mutations.
    pub async fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().await
    }

    /// Walks the vault and returns every regular file, base64-encoded.
    ///
    /// Reserved entries are skipped. Results are sorted by file name so the
    /// listing is deterministic.
    pub async fn list_all(&self) -> CoreResult<Vec<VaultFile>> {
        let _guard = self.lock.read().await;
        let root = self.root.clone();
        task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| CoreError::internal(format!("vault walk task failed: {e}")))?
    }

    /// Writes a file, creating any missing parent directories.
    pub async fn write(&self, path: &str, bytes: &[u8]) -> CoreResult<()> {
        let rel = normalize_path(path)?;
        let _guard = self.lock.write().await;

        let full = self.root.join(&rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&full, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    /// Removes a single file.
    ///
    /// Returns `Ok(false)` when the file did not exist; callers decide
    /// whether that matters.
    pub async fn delete(&self, path: &str) -> CoreResult<bool> {
        let rel = normalize_path(path)?;
        let _guard = self.lock.write().await;

        match tokio::fs::remove_file(self.root.join(&rel)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes every top-level entry except the reserved names.
    pub async fn clean_except_history(&self) -> CoreResult<()> {
        let _guard = self.lock.write().await;

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if RESERVED_NAMES.iter().any(|r| name.as_os_str() == *r) {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await?;
            } else {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }

    /// Decompresses a gzipped tar archive into the vault root.
    ///
    /// Only directory and regular-file entries are supported; anything else
    /// aborts with an archive error, as does an entry whose path escapes the
    /// root. Entries addressed at reserved names are skipped.
    pub async fn extract_targz(&self, bytes: Vec<u8>) -> CoreResult<()> {
        let _guard = self.lock.write().await;
        let root = self.root.clone();
        task::spawn_blocking(move || extract_archive(&root, bytes))
            .await
            .map_err(|e| CoreError::internal(format!("archive extraction task failed: {e}")))?
    }
}

/// Validates and normalizes a vault-relative path.
///
/// Rejects empty and absolute paths, any `..` component, and paths whose
/// first component is a reserved name. Backslashes are treated as
/// separators so escape attempts cannot hide behind them.
pub(crate) fn normalize_path(raw: &str) -> CoreResult<PathBuf> {
    if raw.is_empty() {
        return Err(CoreError::bad_path("(empty)"));
    }

    let cleaned = raw.replace('\\', "/");
    if cleaned.starts_with('/') {
        return Err(CoreError::bad_path(raw));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(&cleaned).components() {
        match component {
            Component::Normal(part) => {
                parts.push(part.to_str().ok_or_else(|| CoreError::bad_path(raw))?);
            }
            Component::CurDir => {}
            _ => return Err(CoreError::bad_path(raw)),
        }
    }

    if parts.is_empty() || RESERVED_NAMES.contains(&parts[0]) {
        return Err(CoreError::bad_path(raw));
    }

    Ok(parts.iter().collect())
}

/// Returns true if the path (after cleaning) points inside a reserved entry
/// without escaping the root — the "skip, don't abort" case for archives.
fn targets_reserved_name(raw: &str) -> bool {
    let cleaned = raw.replace('\\', "/");
    if cleaned.starts_with('/') || cleaned.split('/').any(|c| c == "..") {
        return false;
    }
    cleaned
        .split('/')
        .find(|c| !c.is_empty() && *c != ".")
        .is_some_and(|first| RESERVED_NAMES.contains(&first))
}

fn is_reserved_top_level(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|rel| rel.components().next())
        .is_some_and(|first| RESERVED_NAMES.iter().any(|r| first.as_os_str() == *r))
}

fn walk_files(root: &Path) -> CoreResult<Vec<VaultFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_reserved_top_level(root, e.path()));

    for entry in walker {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io_err) => CoreError::Io(io_err),
            None => CoreError::internal("vault walk failed"),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| CoreError::internal(format!("walk produced foreign path: {e}")))?;
        let path = rel
            .to_str()
            .ok_or_else(|| CoreError::internal(format!("non-utf8 path in vault: {rel:?}")))?
            .replace(std::path::MAIN_SEPARATOR, "/");

        let bytes = std::fs::read(entry.path())?;
        files.push(VaultFile::new(path, BASE64.encode(bytes)));
    }

    Ok(files)
}

fn extract_archive(root: &Path, bytes: Vec<u8>) -> CoreResult<()> {
    let decoder = GzDecoder::new(io::Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| CoreError::archive(format!("cannot read archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| CoreError::archive(format!("corrupt entry: {e}")))?;

        let raw = entry
            .path()
            .map_err(|e| CoreError::archive(format!("bad entry path: {e}")))?
            .to_str()
            .ok_or_else(|| CoreError::archive("non-utf8 entry path"))?
            .to_string();

        let rel = match normalize_path(&raw) {
            Ok(rel) => rel,
            Err(_) if targets_reserved_name(&raw) => {
                warn!(path = %raw, "skipping archive entry aimed at a reserved name");
                continue;
            }
            Err(_) => {
                return Err(CoreError::archive(format!(
                    "entry path escapes the vault: {raw}"
                )));
            }
        };
        let target = root.join(&rel);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                std::fs::create_dir_all(&target)?;
            }
            tar::EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut out = StdFile::create(&target)?;
                io::copy(&mut entry, &mut out)?;
            }
            other => {
                return Err(CoreError::archive(format!(
                    "unsupported entry kind {other:?} for {raw}"
                )));
            }
        }
    }

    Ok(())
}
