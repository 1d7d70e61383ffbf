//! Error types for the sync engine.

use hamlog_store::StoreError;
use hamlog_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Broad origin of a failure.
///
/// Both classes are handled the same way by the loop; the class only
/// shows up in logs and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure, non-2xx status, malformed response.
    Transport,
    /// Anything that went wrong locally during selection, composition or merge.
    Application,
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the failure is likely to go away on its own.
        retryable: bool,
    },

    /// The service answered but did not accept the request.
    #[error("sync service rejected the request (status {status:?})")]
    Rejected {
        /// Status code, if the transport has one.
        status: Option<u16>,
    },

    /// The response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Something else failed locally.
    #[error("application error: {0}")]
    Application(String),

    /// A cycle is already in flight.
    #[error("a sync cycle is already running")]
    Busy,

    /// Sync is switched off.
    #[error("sync is disabled")]
    Disabled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The background loop has stopped.
    #[error("sync loop has shut down")]
    Shutdown,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns where the failure came from.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::Transport { .. } | SyncError::Rejected { .. } | SyncError::Protocol(_) => {
                ErrorClass::Transport
            }
            _ => ErrorClass::Application,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Rejected { status } => !matches!(status, Some(400..=499)),
            SyncError::Config(_) | SyncError::Disabled | SyncError::Shutdown => false,
            _ => true,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
