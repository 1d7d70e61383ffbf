//! Persisted sync cursor.

use crate::messages::WindowRequest;
use serde::{Deserialize, Serialize};

/// High-water marks of records received from the remote service.
///
/// # Invariants
///
/// - Both timestamps only move forward through [`SyncCursor::advanced`]
/// - `completed_full_sync` is only cleared by [`SyncCursor::reset`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Newest Operation `updated_at_millis` seen from the service.
    #[serde(rename = "lastOperationSyncedAtMillis")]
    pub last_operation_synced_at_millis: i64,
    /// Newest QSO `updated_at_millis` seen from the service.
    #[serde(rename = "lastQSOSyncedAtMillis")]
    pub last_qso_synced_at_millis: i64,
    /// Whether a cycle has ever sent and received everything.
    #[serde(rename = "completedFullSync")]
    pub completed_full_sync: bool,
}

impl SyncCursor {
    /// Creates a fresh cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a cursor advanced to the given maxima.
    ///
    /// `None` and values older than the current mark leave it unchanged.
    #[must_use]
    pub fn advanced(mut self, operations_max: Option<i64>, qsos_max: Option<i64>) -> Self {
        if let Some(max) = operations_max {
            self.last_operation_synced_at_millis = self.last_operation_synced_at_millis.max(max);
        }
        if let Some(max) = qsos_max {
            self.last_qso_synced_at_millis = self.last_qso_synced_at_millis.max(max);
        }
        self
    }

    /// Returns a cursor with the full-sync flag set.
    #[must_use]
    pub fn completed(mut self) -> Self {
        self.completed_full_sync = true;
        self
    }

    /// Returns a cursor that starts over (user-initiated full resync).
    #[must_use]
    pub fn reset() -> Self {
        Self::default()
    }

    /// Builds the Operation window starting right after the cursor.
    pub fn operations_window(&self, limit: u32) -> WindowRequest {
        WindowRequest {
            since_millis: self.last_operation_synced_at_millis.saturating_add(1),
            limit,
            any_client: !self.completed_full_sync,
        }
    }

    /// Builds the QSO window starting right after the cursor.
    pub fn qsos_window(&self, limit: u32) -> WindowRequest {
        WindowRequest {
            since_millis: self.last_qso_synced_at_millis.saturating_add(1),
            limit,
            any_client: !self.completed_full_sync,
        }
    }
}
