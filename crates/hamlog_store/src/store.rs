//! The storage contract consumed by the sync engine.

use crate::error::StoreResult;
use hamlog_sync_protocol::{RecordKind, RecordVersion, RemoteRecord, SyncCursor, SyncableRecord};
use serde_json::Value;
use std::sync::Arc;

/// Everything a successful cycle commits, applied as one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleCommit {
    /// QSO versions that were transmitted.
    pub qsos: Vec<RecordVersion>,
    /// Operation versions that were transmitted.
    pub operations: Vec<RecordVersion>,
    /// The settings blob that travelled with the cycle, if any.
    ///
    /// The store confirms it only while it still holds this exact blob.
    pub settings: Option<Value>,
    /// The cursor to persist.
    pub cursor: SyncCursor,
}

/// What a commit actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Records flipped to `synced = true`.
    pub marked: usize,
    /// Records left dirty because they changed after being sent.
    pub stale: usize,
}

/// Local record storage.
///
/// # Invariants
///
/// - Only [`SyncStore::merge_record`], [`SyncStore::merge_records`] and
///   [`SyncStore::commit_cycle`] ever set `synced = true`
/// - [`SyncStore::upsert_local`] and [`SyncStore::delete_local`] always
///   leave the record dirty
/// - [`SyncStore::commit_cycle`] is all-or-nothing
pub trait SyncStore: Send + Sync {
    /// Returns up to `limit` dirty, non-historical QSOs, newest start first.
    fn query_dirty_qsos(&self, limit: usize) -> StoreResult<Vec<SyncableRecord>>;

    /// Returns up to `limit` dirty Operations, newest start first.
    ///
    /// When `among` is given, only Operations with one of those ids qualify.
    fn query_dirty_operations(
        &self,
        limit: usize,
        among: Option<&[String]>,
    ) -> StoreResult<Vec<SyncableRecord>>;

    /// Returns a record by id, tombstones included.
    fn get_record(&self, kind: RecordKind, id: &str) -> StoreResult<Option<SyncableRecord>>;

    /// Writes a remote record in place with `synced = true` when it is
    /// strictly newer than the local row.
    ///
    /// The comparison and the write happen under one lock. Local-only fields
    /// of an existing row are kept. Returns whether the record was applied.
    fn merge_record(&self, kind: RecordKind, record: RemoteRecord) -> StoreResult<bool>;

    /// Writes several remote records, returning how many were applied.
    fn merge_records(&self, kind: RecordKind, records: Vec<RemoteRecord>) -> StoreResult<usize> {
        let mut applied = 0;
        for record in records {
            if self.merge_record(kind, record)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Marks a transmitted snapshot synced and persists the cursor atomically.
    fn commit_cycle(&self, commit: &CycleCommit) -> StoreResult<CommitSummary>;

    /// Returns the persisted cursor.
    fn load_cursor(&self) -> StoreResult<SyncCursor>;

    /// Returns the settings blob, if any.
    fn settings(&self) -> StoreResult<Option<Value>>;

    /// Returns whether the current settings blob was confirmed by the service.
    fn settings_synced(&self) -> StoreResult<bool>;

    /// Inserts or replaces a record after a local edit. Always dirty.
    fn upsert_local(&self, kind: RecordKind, record: SyncableRecord) -> StoreResult<()>;

    /// Soft-deletes a record after a local edit.
    fn delete_local(&self, kind: RecordKind, id: &str, now_millis: i64) -> StoreResult<()>;

    /// Replaces the settings blob and marks it unsynced.
    fn set_settings(&self, settings: Value) -> StoreResult<()>;

    /// Counts dirty records of a kind.
    fn count_dirty(&self, kind: RecordKind) -> StoreResult<usize>;

    /// Resets the cursor for a user-initiated full resync.
    fn reset_cursor(&self) -> StoreResult<()>;
}

impl<S: SyncStore + ?Sized> SyncStore for Arc<S> {
    fn query_dirty_qsos(&self, limit: usize) -> StoreResult<Vec<SyncableRecord>> {
        (**self).query_dirty_qsos(limit)
    }

    fn query_dirty_operations(
        &self,
        limit: usize,
        among: Option<&[String]>,
    ) -> StoreResult<Vec<SyncableRecord>> {
        (**self).query_dirty_operations(limit, among)
    }

    fn get_record(&self, kind: RecordKind, id: &str) -> StoreResult<Option<SyncableRecord>> {
        (**self).get_record(kind, id)
    }

    fn merge_record(&self, kind: RecordKind, record: RemoteRecord) -> StoreResult<bool> {
        (**self).merge_record(kind, record)
    }

    fn merge_records(&self, kind: RecordKind, records: Vec<RemoteRecord>) -> StoreResult<usize> {
        (**self).merge_records(kind, records)
    }

    fn commit_cycle(&self, commit: &CycleCommit) -> StoreResult<CommitSummary> {
        (**self).commit_cycle(commit)
    }

    fn load_cursor(&self) -> StoreResult<SyncCursor> {
        (**self).load_cursor()
    }

    fn settings(&self) -> StoreResult<Option<Value>> {
        (**self).settings()
    }

    fn settings_synced(&self) -> StoreResult<bool> {
        (**self).settings_synced()
    }

    fn upsert_local(&self, kind: RecordKind, record: SyncableRecord) -> StoreResult<()> {
        (**self).upsert_local(kind, record)
    }

    fn delete_local(&self, kind: RecordKind, id: &str, now_millis: i64) -> StoreResult<()> {
        (**self).delete_local(kind, id, now_millis)
    }

    fn set_settings(&self, settings: Value) -> StoreResult<()> {
        (**self).set_settings(settings)
    }

    fn count_dirty(&self, kind: RecordKind) -> StoreResult<usize> {
        (**self).count_dirty(kind)
    }

    fn reset_cursor(&self) -> StoreResult<()> {
        (**self).reset_cursor()
    }
}
