//! Error types for store operations.

use hamlog_sync_protocol::RecordKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store document could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another process holds the store.
    #[error("store is locked by another process: {0}")]
    Locked(PathBuf),

    /// The addressed record does not exist.
    #[error("{kind} {id:?} not found")]
    NotFound {
        /// Record kind.
        kind: RecordKind,
        /// Record id.
        id: String,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = StoreError::not_found(RecordKind::Operation, "op-9");
        assert_eq!(err.to_string(), "operation \"op-9\" not found");
    }
}
