//! # Yamanaka Core
//!
//! Server-side sync engine for a personal note vault.
//!
//! This crate provides:
//! - Locked reads and writes of vault contents ([`VaultStore`])
//! - Periodic history snapshots through [`HistoryStore`]
//! - Durable per-device backlogs ([`EventSpool`])
//! - Device membership tracking ([`ClientRegistry`])
//! - Event fan-out with slow-consumer policy ([`Broadcaster`])

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
mod error;
mod history;
mod registry;
mod spool;
mod vault;

pub use broadcast::Broadcaster;
pub use error::{CoreError, CoreResult};
pub use history::{snapshot, GitHistory, HistoryStore};
pub use registry::ClientRegistry;
pub use spool::EventSpool;
pub use vault::{VaultStore, CLIENTS_FILE, HISTORY_DIR, SPOOL_DIR};
