//! JSON-file-backed store.

use crate::error::{StoreError, StoreResult};
use crate::state::StoreState;
use crate::store::{CommitSummary, CycleCommit, SyncStore};
use fs2::FileExt;
use hamlog_sync_protocol::{RecordKind, RemoteRecord, SyncCursor, SyncableRecord};
use parking_lot::RwLock;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A store persisted as a single JSON document.
///
/// ```text
/// <path>           # the document
/// <path>.lock      # advisory lock, held while the store is open
/// <path>.tmp       # scratch file for atomic replacement
/// ```
///
/// # Durability
///
/// Every mutating call builds the next state, writes it to the scratch
/// file, fsyncs it and renames it over the document. The in-memory state
/// only changes once the rename succeeded, so a failed write leaves both
/// the file and the open store at the previous state.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process holds the store (`Locked`)
    /// - The document exists but is not a valid store
    /// - I/O errors occur
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling(path, "lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        let state = if path.exists() {
            let bytes = fs::read(path)?;
            if bytes.is_empty() {
                StoreState::new()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            StoreState::new()
        };

        tracing::debug!(
            path = %path.display(),
            operations = state.operations.len(),
            qsos = state.qsos.len(),
            "opened file store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the full contents.
    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Applies `f` to a copy of the state, persists it, then publishes it.
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> StoreResult<R>) -> StoreResult<R> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let result = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(result)
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let temp_path = sibling(&self.path, "tmp");
        let data = serde_json::to_vec_pretty(state)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

impl SyncStore for FileStore {
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
        self.mutate(|state| Ok(state.merge(kind, record)))
    }

    fn merge_records(&self, kind: RecordKind, records: Vec<RemoteRecord>) -> StoreResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.mutate(|state| {
            let mut applied = 0;
            for record in records {
                if state.merge(kind, record) {
                    applied += 1;
                }
            }
            Ok(applied)
        })
    }

    fn commit_cycle(&self, commit: &CycleCommit) -> StoreResult<CommitSummary> {
        self.mutate(|state| Ok(state.commit(commit)))
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
        self.mutate(|state| {
            state.upsert_local(kind, record);
            Ok(())
        })
    }

    fn delete_local(&self, kind: RecordKind, id: &str, now_millis: i64) -> StoreResult<()> {
        self.mutate(|state| state.delete_local(kind, id, now_millis))
    }

    fn set_settings(&self, settings: Value) -> StoreResult<()> {
        self.mutate(|state| {
            state.set_settings(settings);
            Ok(())
        })
    }

    fn count_dirty(&self, kind: RecordKind) -> StoreResult<usize> {
        Ok(self.state.read().count_dirty(kind))
    }

    fn reset_cursor(&self) -> StoreResult<()> {
        self.mutate(|state| {
            state.cursor = SyncCursor::reset();
            Ok(())
        })
    }
}
