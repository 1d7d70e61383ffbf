//! In-memory store for tests and embedding.

use crate::error::StoreResult;
use crate::state::StoreState;
use crate::store::{CommitSummary, CycleCommit, SyncStore};
use hamlog_sync_protocol::{RecordKind, RemoteRecord, SyncCursor, SyncableRecord};
use parking_lot::RwLock;
use serde_json::Value;

/// A store that keeps everything in memory.
///
/// Each call takes the lock once, so every mutation (a cycle commit in
/// particular) is atomic with respect to concurrent readers and writers.
///
/// # Example
///
/// ```rust
/// use hamlog_store::{MemoryStore, SyncStore};
///
/// let store = MemoryStore::new();
/// assert!(!store.load_cursor().unwrap().completed_full_sync);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given contents.
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Returns a copy of the full contents.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }
}

impl SyncStore for MemoryStore {
    fn query_dirty_qsos(&self, limit: usize) -> StoreResult<Vec<SyncableRecord>> {
        Ok(self.state.read().dirty_qsos(limit))
    }

    fn query_dirty_operations(
        &self,
        limit: usize,
        among: Option<&[String]>,
    ) -> StoreResult<Vec<SyncableRecord>> {
        Ok(self.state.read().dirty_operations(limit, among))
    }

    fn get_record(&self, kind: RecordKind, id: &str) -> StoreResult<Option<SyncableRecord>> {
        Ok(self.state.read().get(kind, id).cloned())
    }

    fn merge_record(&self, kind: RecordKind, record: RemoteRecord) -> StoreResult<bool> {
        Ok(self.state.write().merge(kind, record))
    }

    fn merge_records(&self, kind: RecordKind, records: Vec<RemoteRecord>) -> StoreResult<usize> {
        let mut state = self.state.write();
        let mut applied = 0;
        for record in records {
            if state.merge(kind, record) {
                applied += 1;
            }
        }
        Ok(applied)
    }

    fn commit_cycle(&self, commit: &CycleCommit) -> StoreResult<CommitSummary> {
        Ok(self.state.write().commit(commit))
    }

    fn load_cursor(&self) -> StoreResult<SyncCursor> {
        Ok(self.state.read().cursor)
    }

    fn settings(&self) -> StoreResult<Option<Value>> {
        Ok(self.state.read().settings.clone())
    }

    fn settings_synced(&self) -> StoreResult<bool> {
        Ok(self.state.read().settings_synced)
    }

    fn upsert_local(&self, kind: RecordKind, record: SyncableRecord) -> StoreResult<()> {
        self.state.write().upsert_local(kind, record);
        Ok(())
    }

    fn delete_local(&self, kind: RecordKind, id: &str, now_millis: i64) -> StoreResult<()> {
        self.state.write().delete_local(kind, id, now_millis)
    }

    fn set_settings(&self, settings: Value) -> StoreResult<()> {
        self.state.write().set_settings(settings);
        Ok(())
    }

    fn count_dirty(&self, kind: RecordKind) -> StoreResult<usize> {
        Ok(self.state.read().count_dirty(kind))
    }

    fn reset_cursor(&self) -> StoreResult<()> {
        self.state.write().cursor = SyncCursor::reset();
        Ok(())
    }
}
