//! # Yamanaka Sync Protocol
//!
//! Wire types shared between the sync server and its clients.
//!
//! This crate provides:
//! - Change events republished to subscribers ([`SyncEvent`])
//! - Request and response bodies for the HTTP endpoints

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod event;
mod messages;

pub use event::SyncEvent;
pub use messages::{PullResponse, PushRequest, StatusResponse, VaultFile};
