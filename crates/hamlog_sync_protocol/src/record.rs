//! Syncable records: Operations and QSOs.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parent id of QSOs imported from historical logs.
///
/// Such QSOs are never selected for upload.
pub const HISTORICAL_OPERATION_ID: &str = "historical";

/// The two kinds of records the sync engine moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A user activity session grouping QSOs.
    Operation,
    /// A single logged contact.
    Qso,
}

impl RecordKind {
    /// Returns the kind name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Operation => "operation",
            RecordKind::Qso => "qso",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as held in local storage.
///
/// `synced == false` means the record has local changes the remote
/// service has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncableRecord {
    /// Record id (stable across devices).
    pub id: String,
    /// Parent Operation id, `None` for Operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Start time, used to order selection newest first.
    pub started_at_millis: i64,
    /// Last modification time.
    pub updated_at_millis: i64,
    /// Whether the current version is confirmed by the remote service.
    pub synced: bool,
    /// Soft-delete tombstone.
    #[serde(default)]
    pub deleted: bool,
    /// Opaque domain payload.
    #[serde(default)]
    pub data: Value,
    /// Local-only fields, never transmitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<Value>,
}

impl SyncableRecord {
    /// Creates a new dirty record.
    pub fn new(id: impl Into<String>, updated_at_millis: i64) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            started_at_millis: updated_at_millis,
            updated_at_millis,
            synced: false,
            deleted: false,
            data: Value::Null,
            local: None,
        }
    }

    /// Sets the parent Operation id.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_started_at(mut self, started_at_millis: i64) -> Self {
        self.started_at_millis = started_at_millis;
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Sets the local-only fields.
    #[must_use]
    pub fn with_local(mut self, local: Value) -> Self {
        self.local = Some(local);
        self
    }

    /// Returns the identity of this exact version.
    pub fn version(&self) -> RecordVersion {
        RecordVersion {
            id: self.id.clone(),
            updated_at_millis: self.updated_at_millis,
        }
    }

    /// Returns true for QSOs belonging to the historical pseudo-operation.
    pub fn is_historical(&self) -> bool {
        self.parent_id.as_deref() == Some(HISTORICAL_OPERATION_ID)
    }
}

/// A record as carried over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Record id.
    pub id: String,
    /// Parent Operation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Start time.
    #[serde(default)]
    pub started_at_millis: i64,
    /// Last modification time; the newest version wins.
    pub updated_at_millis: i64,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    /// Opaque domain payload.
    #[serde(default)]
    pub data: Value,
}

impl RemoteRecord {
    /// Builds the wire form of a local record, dropping local-only fields.
    pub fn from_local(record: &SyncableRecord) -> Self {
        Self {
            id: record.id.clone(),
            parent_id: record.parent_id.clone(),
            started_at_millis: record.started_at_millis,
            updated_at_millis: record.updated_at_millis,
            deleted: record.deleted,
            data: record.data.clone(),
        }
    }

    /// Builds the local form of this record.
    pub fn into_local(self, synced: bool) -> SyncableRecord {
        SyncableRecord {
            id: self.id,
            parent_id: self.parent_id,
            started_at_millis: self.started_at_millis,
            updated_at_millis: self.updated_at_millis,
            synced,
            deleted: self.deleted,
            data: self.data,
            local: None,
        }
    }

    /// Checks that the record is well formed for its kind.
    pub fn validate(&self, kind: RecordKind) -> ProtocolResult<()> {
        if self.id.is_empty() {
            return Err(ProtocolError::invalid_record(
                kind.as_str(),
                "",
                "empty id",
            ));
        }
        if kind == RecordKind::Qso && self.parent_id.is_none() && !self.deleted {
            return Err(ProtocolError::invalid_record(
                kind.as_str(),
                self.id.clone(),
                "qso without parent operation",
            ));
        }
        Ok(())
    }
}

/// The exact version of a record that was transmitted.
///
/// Marking synced by version leaves a record dirty when it was mutated
/// again while the cycle carrying the older version was in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordVersion {
    /// Record id.
    pub id: String,
    /// `updated_at_millis` of the transmitted version.
    pub updated_at_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_local_strips_local_fields() {
        let record = SyncableRecord::new("q-1", 10)
            .with_parent("op-1")
            .with_data(json!({"call": "K1ABC"}))
            .with_local(json!({"lookup": "cached"}));

        let remote = RemoteRecord::from_local(&record);
        let wire = serde_json::to_value(&remote).unwrap();

        assert_eq!(wire["id"], "q-1");
        assert_eq!(wire["parentId"], "op-1");
        assert_eq!(wire["updatedAtMillis"], 10);
        assert!(wire.get("local").is_none());
        assert!(wire.get("synced").is_none());
    }

    #[test]
    fn into_local_has_no_local_fields() {
        let remote = RemoteRecord {
            id: "op-1".into(),
            parent_id: None,
            started_at_millis: 5,
            updated_at_millis: 7,
            deleted: true,
            data: Value::Null,
        };
        let local = remote.into_local(true);
        assert!(local.synced);
        assert!(local.deleted);
        assert!(local.local.is_none());
        assert_eq!(local.updated_at_millis, 7);
    }

    #[test]
    fn historical_detection() {
        let qso = SyncableRecord::new("q", 1).with_parent(HISTORICAL_OPERATION_ID);
        assert!(qso.is_historical());
        assert!(!SyncableRecord::new("q", 1).with_parent("op").is_historical());
    }

    #[test]
    fn validate_rejects_orphan_qso() {
        let mut remote = RemoteRecord::from_local(&SyncableRecord::new("q-1", 1));
        assert!(remote.validate(RecordKind::Qso).is_err());
        assert!(remote.validate(RecordKind::Operation).is_ok());

        // Tombstones may arrive without their parent.
        remote.deleted = true;
        assert!(remote.validate(RecordKind::Qso).is_ok());
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RecordKind::Qso).unwrap(), "\"qso\"");
        assert_eq!(RecordKind::Operation.to_string(), "operation");
    }
}
