//! Device membership: every id ever seen, and who is live right now.
//!
//! Two sets with one lock. *Tracked* devices are persisted to
//! `clients.json` and only ever grow; *active* devices hold the live event
//! channel for an open stream. Active is always a subset of tracked.

use crate::vault::CLIENTS_FILE;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use yamanaka_protocol::SyncEvent;

/// Capacity of a subscriber's live channel. Deliberately tiny: a subscriber
/// that is not keeping up overflows immediately and its events spill to the
/// spool instead of blocking the broadcast path.
const CLIENT_CHANNEL_CAPACITY: usize = 1;

pub(crate) struct ActiveDevice {
    pub(crate) sender: mpsc::Sender<SyncEvent>,
    epoch: u64,
}

pub(crate) struct Membership {
    /// Every device id that has ever opened an event stream. The `bool`
    /// values exist only to match the roster's on-disk JSON object form.
    pub(crate) tracked: BTreeMap<String, bool>,
    pub(crate) active: HashMap<String, ActiveDevice>,
}

/// Tracks device membership and owns the live event channels.
pub struct ClientRegistry {
    roster_path: PathBuf,
    inner: Arc<RwLock<Membership>>,
    persist_gate: Arc<tokio::sync::Mutex<()>>,
    next_epoch: AtomicU64,
}

impl ClientRegistry {
    /// Loads the registry, reading the persisted roster if present.
    ///
    /// A corrupt roster is logged and treated as empty rather than keeping
    /// the server down.
    pub fn load(vault_root: &Path) -> Self {
        let roster_path = vault_root.join(CLIENTS_FILE);
        let tracked = match std::fs::read(&roster_path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|err| {
                warn!(%err, "clients.json is corrupt, starting with an empty roster");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(%err, "could not read clients.json, starting with an empty roster");
                BTreeMap::new()
            }
        };

        Self {
            roster_path,
            inner: Arc::new(RwLock::new(Membership {
                tracked,
                active: HashMap::new(),
            })),
            persist_gate: Arc::new(tokio::sync::Mutex::new(())),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Creates a live channel pair with the registry's capacity policy.
    pub fn event_channel() -> (mpsc::Sender<SyncEvent>, mpsc::Receiver<SyncEvent>) {
        mpsc::channel(CLIENT_CHANNEL_CAPACITY)
    }

    /// Registers a device as active (and tracked, if new).
    ///
    /// Returns an epoch token identifying this registration; pass it back to
    /// [`ClientRegistry::deregister`] so a stale teardown cannot evict a
    /// newer connection with the same id.
    pub fn register(&self, device_id: &str, sender: mpsc::Sender<SyncEvent>) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;

        let newly_tracked = {
            let mut membership = self.inner.write();
            membership
                .active
                .insert(device_id.to_string(), ActiveDevice { sender, epoch });
            membership
                .tracked
                .insert(device_id.to_string(), true)
                .is_none()
        };

        if newly_tracked {
            self.persist_roster_in_background();
        }
        epoch
    }

    /// Removes a device's active entry, closing its channel.
    ///
    /// No-op unless `epoch` matches the current registration. Tracked
    /// membership is untouched — there is no transition out of tracked.
    pub fn deregister(&self, device_id: &str, epoch: u64) {
        let mut membership = self.inner.write();
        let current = membership
            .active
            .get(device_id)
            .is_some_and(|device| device.epoch == epoch);
        if current {
            membership.active.remove(device_id);
        }
    }

    /// Returns true if the device currently holds a live event stream.
    pub fn is_active(&self, device_id: &str) -> bool {
        self.inner.read().active.contains_key(device_id)
    }

    /// Returns every tracked device id.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.inner.read().tracked.keys().cloned().collect()
    }

    pub(crate) fn membership(&self) -> RwLockReadGuard<'_, Membership> {
        self.inner.read()
    }

    /// Writes the roster without holding the membership lock during disk
    /// I/O. The write gate serializes concurrent persists; the snapshot is
    /// taken inside the gate so the last write always carries the newest
    /// roster.
    fn persist_roster_in_background(&self) {
        let inner = Arc::clone(&self.inner);
        let gate = Arc::clone(&self.persist_gate);
        let path = self.roster_path.clone();

        tokio::spawn(async move {
            let _write_turn = gate.lock().await;
            let snapshot = inner.read().tracked.clone();
            let data = match serde_json::to_vec_pretty(&snapshot) {
                Ok(data) => data,
                Err(err) => {
                    warn!(%err, "could not serialize tracked-device roster");
                    return;
                }
            };
            if let Err(err) = tokio::fs::write(&path, data).await {
                warn!(%err, path = %path.display(), "could not persist tracked-device roster");
            }
        });
    }
}
