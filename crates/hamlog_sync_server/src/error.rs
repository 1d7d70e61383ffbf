//! Error types for the sync service.

use hamlog_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for service operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync service.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request body could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(#[from] ProtocolError),

    /// Too many records in one request.
    #[error("request carries {records} records, at most {max} allowed")]
    TooLarge {
        /// Records in the request.
        records: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Unknown endpoint.
    #[error("no such endpoint: {0}")]
    NotFound(String),

    /// The service is temporarily unable to answer.
    #[error("service unavailable")]
    Unavailable,

    /// Internal service error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::Malformed(_)
                | ServerError::TooLarge { .. }
                | ServerError::NotFound(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Unavailable | ServerError::Internal(_))
    }

    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) | ServerError::Malformed(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::TooLarge { .. } => 413,
            ServerError::Unavailable => 503,
            ServerError::Internal(_) => 500,
        }
    }
}
