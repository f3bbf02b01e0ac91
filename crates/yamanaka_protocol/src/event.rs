//! Change events republished to subscribers.

use serde::{Deserialize, Serialize};

/// A single vault change event.
///
/// Events are fanned out to every tracked device except the one that caused
/// the change. The sender's id is never part of the event — suppression is
/// done by the broadcaster, so nothing identifying the sender can reach the
/// wire.
///
/// The serde representation is internally tagged with `"event"`; that form
/// is what the missed-event spool persists. On the wire the tag travels as
/// the stream's event name and the remaining fields as the data payload —
/// see [`SyncEvent::name`] and [`SyncEvent::payload_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A file was created or modified.
    FileUpdated {
        /// Vault-relative path, forward slashes.
        path: String,
        /// New file bytes, base64-encoded.
        content: String,
    },
    /// A file was removed.
    FileDeleted {
        /// Vault-relative path, forward slashes.
        path: String,
    },
    /// The recipient's incremental view is unreliable and it must pull the
    /// whole vault.
    FullSyncRequired {
        /// Human-readable reason for the resync.
        message: String,
    },
}

#[derive(Serialize)]
struct FilePayload<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Serialize)]
struct MessagePayload<'a> {
    message: &'a str,
}

impl SyncEvent {
    /// Creates an update event. `content` is the base64 of the new bytes.
    pub fn file_updated(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::FileUpdated {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Creates a delete event.
    pub fn file_deleted(path: impl Into<String>) -> Self {
        Self::FileDeleted { path: path.into() }
    }

    /// Creates a full-sync signal.
    pub fn full_sync_required(message: impl Into<String>) -> Self {
        Self::FullSyncRequired {
            message: message.into(),
        }
    }

    /// Returns the event name used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::FileUpdated { .. } => "file_updated",
            SyncEvent::FileDeleted { .. } => "file_deleted",
            SyncEvent::FullSyncRequired { .. } => "full_sync_required",
        }
    }

    /// Serializes the data payload without the event tag.
    pub fn payload_json(&self) -> String {
        let payload = match self {
            SyncEvent::FileUpdated { path, content } => serde_json::to_string(&FilePayload {
                path,
                content: Some(content),
            }),
            SyncEvent::FileDeleted { path } => serde_json::to_string(&FilePayload {
                path,
                content: None,
            }),
            SyncEvent::FullSyncRequired { message } => {
                serde_json::to_string(&MessagePayload { message })
            }
        };
        payload.expect("event payloads serialize to JSON")
    }
}
