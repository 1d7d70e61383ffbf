//! Record fixtures and store helpers.

use hamlog_store::{FileStore, MemoryStore, SyncStore};
use hamlog_sync_protocol::{RecordKind, SyncableRecord, HISTORICAL_OPERATION_ID};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds an Operation record.
pub fn operation(id: &str, updated: i64) -> SyncableRecord {
    SyncableRecord::new(id, updated)
        .with_started_at(updated)
        .with_data(json!({ "title": id }))
}

/// Builds a QSO record under `parent`.
pub fn qso(id: &str, parent: &str, updated: i64) -> SyncableRecord {
    SyncableRecord::new(id, updated)
        .with_parent(parent)
        .with_started_at(updated)
        .with_data(json!({ "call": id.to_uppercase(), "band": "20m" }))
}

/// Builds a QSO that belongs to no real Operation.
pub fn historical_qso(id: &str, updated: i64) -> SyncableRecord {
    qso(id, HISTORICAL_OPERATION_ID, updated)
}

/// A file store in a temporary directory, removed on drop.
pub struct TestFileStore {
    /// The store.
    pub store: FileStore,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates an empty file store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("hamlog.json");
        let store = FileStore::open(&path).expect("Failed to open file store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes and reopens the store, as after a restart.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        drop(store);
        let store = FileStore::open(&path).expect("Failed to reopen file store");
        Self {
            store,
            path,
            _temp_dir,
        }
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileStore, &Path) -> R,
{
    let test_store = TestFileStore::new();
    f(&test_store.store, test_store.path())
}

/// Seeded stores.
pub mod scenarios {
    use super::*;

    /// Creates a store holding `operations` dirty Operations with
    /// `qsos_per_operation` dirty QSOs each.
    ///
    /// Ids are `op-NN` and `qso-NN-MMM`; every record gets its own
    /// timestamp, QSOs after all Operations.
    pub fn logbook(operations: usize, qsos_per_operation: usize) -> MemoryStore {
        let store = MemoryStore::new();
        populate(&store, operations, qsos_per_operation);
        store
    }

    /// Writes the [`logbook`] records into an existing store.
    pub fn populate<S: SyncStore>(store: &S, operations: usize, qsos_per_operation: usize) {
        let mut clock = 1_000;
        for op in 0..operations {
            clock += 1;
            store
                .upsert_local(RecordKind::Operation, operation(&format!("op-{op:02}"), clock))
                .expect("Failed to write operation");
        }
        for op in 0..operations {
            for n in 0..qsos_per_operation {
                clock += 1;
                store
                    .upsert_local(
                        RecordKind::Qso,
                        qso(&format!("qso-{op:02}-{n:03}"), &format!("op-{op:02}"), clock),
                    )
                    .expect("Failed to write qso");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logbook_is_entirely_dirty() {
        let store = scenarios::logbook(3, 4);
        assert_eq!(store.count_dirty(RecordKind::Operation).unwrap(), 3);
        assert_eq!(store.count_dirty(RecordKind::Qso).unwrap(), 12);
        let q = store
            .get_record(RecordKind::Qso, "qso-02-003")
            .unwrap()
            .unwrap();
        assert_eq!(q.parent_id.as_deref(), Some("op-02"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let test_store = TestFileStore::new();
        scenarios::populate(&test_store.store, 1, 2);

        let test_store = test_store.reopen();
        assert_eq!(test_store.count_dirty(RecordKind::Qso).unwrap(), 2);
    }

    #[test]
    fn historical_qso_is_flagged() {
        assert!(historical_qso("q", 1).is_historical());
        assert!(!qso("q", "op", 1).is_historical());
    }
}
