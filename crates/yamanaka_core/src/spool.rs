//! Durable per-device backlog of undelivered events.
//!
//! Each device gets its own directory under `<root>/missed_events/`; each
//! event is one JSON file named by a nanosecond timestamp, so numeric
//! filename order is append order. The whole directory is removed after a
//! successful drain.

use crate::error::CoreResult;
use crate::vault::SPOOL_DIR;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use yamanaka_protocol::SyncEvent;

/// On-disk queue of events awaiting delivery to offline or overflowed
/// subscribers.
pub struct EventSpool {
    root: PathBuf,
    clock: AtomicU64,
}

impl EventSpool {
    /// Creates a spool rooted under the given vault directory.
    pub fn new(vault_root: &Path) -> Self {
        Self {
            root: vault_root.join(SPOOL_DIR),
            clock: AtomicU64::new(0),
        }
    }

    /// Returns a strictly increasing nanosecond stamp.
    ///
    /// Two appends landing in the same nanosecond get consecutive stamps, so
    /// filenames never collide and sort order stays append order.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        let prev = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    /// Persists one event for a device.
    pub async fn append(&self, device_id: &str, event: &SyncEvent) -> CoreResult<()> {
        let dir = self.root.join(device_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{}.json", self.next_stamp()));
        let data = serde_json::to_vec(event)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    /// Returns all spooled events for a device in append order and removes
    /// the backlog.
    ///
    /// A missing directory is an empty backlog. Unreadable or corrupt
    /// entries are logged and skipped; the rest are still returned.
    pub async fn drain(&self, device_id: &str) -> CoreResult<Vec<SyncEvent>> {
        let dir = self.root.join(device_id);

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries: Vec<(u64, PathBuf)> = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name();
            let stamp = Path::new(&name)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok());
            match stamp {
                Some(stamp) => entries.push((stamp, entry.path())),
                None => warn!(device = %device_id, file = ?name, "ignoring stray spool file"),
            }
        }
        entries.sort_by_key(|(stamp, _)| *stamp);

        let mut events = Vec::with_capacity(entries.len());
        for (_, path) in entries {
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(err) => {
                    warn!(device = %device_id, file = %path.display(), %err, "skipping unreadable spool entry");
                    continue;
                }
            };
            match serde_json::from_slice::<SyncEvent>(&data) {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(device = %device_id, file = %path.display(), %err, "skipping corrupt spool entry");
                }
            }
        }

        tokio::fs::remove_dir_all(&dir).await?;
        Ok(events)
    }
}
