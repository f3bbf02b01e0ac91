//! Request and response bodies for the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// A single file in transit: vault-relative path plus base64 content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFile {
    /// Path relative to the vault root, forward slashes.
    pub path: String,
    /// File bytes, base64-encoded.
    pub content: String,
}

impl VaultFile {
    /// Creates a new file record.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Body of a push: incremental per-file mutations from one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Files to create or overwrite.
    #[serde(default)]
    pub files_to_update: Vec<VaultFile>,
    /// Paths to remove.
    #[serde(default)]
    pub files_to_delete: Vec<String>,
}

/// Body of a pull response: the full vault listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullResponse {
    /// Every regular file currently in the vault.
    pub files: Vec<VaultFile>,
}

impl PullResponse {
    /// Creates a pull response from a listing.
    pub fn new(files: Vec<VaultFile>) -> Self {
        Self { files }
    }
}

/// Generic status body returned by mutations and the health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Outcome description.
    pub status: String,
}

impl StatusResponse {
    /// Health-check body.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// Success body for a processed push.
    pub fn push_processed() -> Self {
        Self {
            status: "success, push processed and changes broadcasted".to_string(),
        }
    }

    /// Success body for a processed initial sync.
    pub fn initial_sync_processed() -> Self {
        Self {
            status: "success, initial sync processed. Other clients notified.".to_string(),
        }
    }
}
