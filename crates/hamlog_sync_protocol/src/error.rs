//! Error types for protocol encoding and validation.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or validating messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A message could not be serialized.
    #[error("failed to encode {what}: {source}")]
    Encode {
        /// Which message was being encoded.
        what: &'static str,
        /// Underlying serializer error.
        source: serde_json::Error,
    },

    /// A message could not be parsed.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Which message was being decoded.
        what: &'static str,
        /// Underlying parser error.
        source: serde_json::Error,
    },

    /// A record is structurally invalid for its kind.
    #[error("invalid {kind} record {id:?}: {reason}")]
    InvalidRecord {
        /// Record kind name.
        kind: &'static str,
        /// Record id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ProtocolError {
    /// Creates an invalid record error.
    pub fn invalid_record(
        kind: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}
