//! Error types for the sync engine core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core sync operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A request path escapes the vault or names a reserved entry.
    #[error("bad path: {path}")]
    BadPath {
        /// The offending path as received.
        path: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The uploaded archive is not a valid gzipped tar, or contains
    /// unsupported entries.
    #[error("archive error: {message}")]
    Archive {
        /// Description of the problem.
        message: String,
    },

    /// History store failure.
    #[error("history error: {0}")]
    History(#[from] git2::Error),

    /// Event serialization failure.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another process holds the vault lock.
    #[error("vault locked: another process has exclusive access")]
    VaultLocked,

    /// Internal invariant failure.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a bad-path error.
    pub fn bad_path(path: impl Into<String>) -> Self {
        Self::BadPath { path: path.into() }
    }

    /// Creates an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::bad_path("../etc/passwd");
        assert!(err.to_string().contains("../etc/passwd"));

        let err = CoreError::archive("unsupported entry");
        assert!(err.to_string().contains("unsupported entry"));
    }
}
