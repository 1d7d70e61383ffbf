//! The sync engine: one cycle at a time.

use crate::completion::{Completion, ExchangeCounts};
use crate::composer::compose;
use crate::config::{SyncConfig, SyncMode};
use crate::error::{ErrorClass, SyncError, SyncResult};
use crate::merge::{apply_response, MergeReport};
use crate::selector::{select_dirty, SelectionLimits};
use crate::transport::SyncTransport;
use hamlog_store::{CommitSummary, CycleCommit, SyncStore};
use hamlog_sync_protocol::SyncCursor;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that committed.
    pub cycles_completed: u64,
    /// Cycles that failed.
    pub cycles_failed: u64,
    /// QSOs sent by committed cycles.
    pub qsos_sent: u64,
    /// Operations sent by committed cycles.
    pub operations_sent: u64,
    /// Records received by committed cycles.
    pub records_received: u64,
    /// Last error message.
    pub last_error: Option<String>,
    /// Class of the last error.
    pub last_error_class: Option<ErrorClass>,
    /// When the last cycle committed.
    pub last_success: Option<Instant>,
}

/// Result of one committed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Mode the cycle ran in.
    pub mode: SyncMode,
    /// QSOs sent.
    pub qsos_sent: usize,
    /// Operations sent.
    pub operations_sent: usize,
    /// Whether the settings blob was sent.
    pub settings_sent: bool,
    /// Merge outcome.
    pub merge: MergeReport,
    /// Commit outcome.
    pub commit: CommitSummary,
    /// Whether backlog remains.
    pub completion: Completion,
    /// Cursor after the cycle.
    pub cursor: SyncCursor,
}

impl CycleReport {
    /// Returns true if neither side has backlog.
    pub fn is_complete(&self) -> bool {
        self.completion.is_complete()
    }
}

/// Releases the exclusion slot when dropped, including when the cycle
/// future itself is dropped mid-exchange.
struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The sync engine.
///
/// # Invariants
///
/// - At most one cycle runs at a time; a second caller gets
///   [`SyncError::Busy`]
/// - Records are marked synced and the cursor is advanced in a single
///   store transaction, and only after an accepted exchange and a
///   successful merge
pub struct SyncEngine<T: SyncTransport, S: SyncStore> {
    config: SyncConfig,
    transport: T,
    store: S,
    cursor: RwLock<SyncCursor>,
    stats: RwLock<SyncStats>,
    locked: AtomicBool,
    enabled: AtomicBool,
}

impl<T: SyncTransport, S: SyncStore> SyncEngine<T, S> {
    /// Creates a new sync engine.
    ///
    /// Validates the configuration and loads the persisted cursor.
    pub fn new(config: SyncConfig, transport: T, store: S) -> SyncResult<Self> {
        config.validate()?;
        let cursor = store.load_cursor()?;
        let enabled = config.sync_enabled;
        Ok(Self {
            config,
            transport,
            store,
            cursor: RwLock::new(cursor),
            stats: RwLock::new(SyncStats::default()),
            locked: AtomicBool::new(false),
            enabled: AtomicBool::new(enabled),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cursor as of the last cycle.
    pub fn cursor(&self) -> SyncCursor {
        *self.cursor.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a cycle holds the slot.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Returns whether sync is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Switches sync on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Runs exactly one cycle.
    ///
    /// Failures leave every record and the cursor as they were.
    pub async fn sync_once(&self, mode: SyncMode) -> SyncResult<CycleReport> {
        if !self.is_enabled() {
            return Err(SyncError::Disabled);
        }
        if self
            .locked
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::Busy);
        }
        let _slot = SlotGuard(&self.locked);

        match self.run_cycle(mode).await {
            Ok(report) => {
                self.record_success(&report);
                tracing::info!(
                    %mode,
                    qsos_sent = report.qsos_sent,
                    operations_sent = report.operations_sent,
                    received = report.merge.qsos_received + report.merge.operations_received,
                    complete = report.is_complete(),
                    "sync cycle committed"
                );
                Ok(report)
            }
            Err(err) => {
                self.record_failure(&err);
                tracing::warn!(%mode, class = ?err.class(), error = %err, "sync cycle failed");
                Err(err)
            }
        }
    }

    async fn run_cycle(&self, mode: SyncMode) -> SyncResult<CycleReport> {
        let cursor = self.store.load_cursor()?;
        *self.cursor.write() = cursor;

        let batch_size = self.config.batch_size(mode);
        let limits = SelectionLimits {
            qsos: batch_size as usize,
            operations: self.config.operation_batch_size(mode) as usize,
        };
        let selection = select_dirty(&self.store, limits)?;
        let settings = if self.store.settings_synced()? {
            None
        } else {
            self.store.settings()?
        };
        let batch = compose(&self.store, selection, &cursor, settings, &self.config, mode)?;

        let response = self.transport.exchange(&batch.request).await?;
        if !response.ok {
            return Err(SyncError::Rejected {
                status: response.status,
            });
        }
        let body = response
            .json
            .ok_or_else(|| SyncError::Protocol("accepted response carried no body".into()))?;

        let merge = apply_response(&self.store, body)?;

        let snapshot = batch.snapshot;
        let counts = ExchangeCounts {
            qsos_sent: snapshot.qsos.len(),
            operations_sent: snapshot.operations.len(),
            qsos_received: merge.qsos_received,
            operations_received: merge.operations_received,
        };
        let completion =
            Completion::evaluate(counts, batch_size, self.config.operation_batch_ratio);

        let mut next = cursor.advanced(merge.operations_max_updated, merge.qsos_max_updated);
        if completion.is_complete() {
            next = next.completed();
        }

        let settings_sent = snapshot.settings.is_some();
        let commit = self.store.commit_cycle(&CycleCommit {
            qsos: snapshot.qsos,
            operations: snapshot.operations,
            settings: snapshot.settings,
            cursor: next,
        })?;
        if commit.stale > 0 {
            tracing::debug!(stale = commit.stale, "records changed while in flight stay dirty");
        }
        *self.cursor.write() = next;

        Ok(CycleReport {
            mode,
            qsos_sent: counts.qsos_sent,
            operations_sent: counts.operations_sent,
            settings_sent,
            merge,
            commit,
            completion,
            cursor: next,
        })
    }

    fn record_success(&self, report: &CycleReport) {
        let mut stats = self.stats.write();
        stats.cycles_completed += 1;
        stats.qsos_sent += report.qsos_sent as u64;
        stats.operations_sent += report.operations_sent as u64;
        stats.records_received +=
            (report.merge.qsos_received + report.merge.operations_received) as u64;
        stats.last_success = Some(Instant::now());
    }

    fn record_failure(&self, err: &SyncError) {
        let mut stats = self.stats.write();
        stats.cycles_failed += 1;
        stats.last_error = Some(err.to_string());
        stats.last_error_class = Some(err.class());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockOutcome, MockTransport};
    use hamlog_store::MemoryStore;
    use hamlog_sync_protocol::{RecordKind, RemoteRecord, SyncResponseBody, SyncableRecord};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(
        store: Arc<MemoryStore>,
    ) -> SyncEngine<Arc<MockTransport>, Arc<MemoryStore>> {
        SyncEngine::new(
            SyncConfig::new().with_batch_sizes(2, 5),
            Arc::new(MockTransport::new()),
            store,
        )
        .unwrap()
    }

    fn dirty_qso(store: &MemoryStore, id: &str, updated: i64) {
        store
            .upsert_local(
                RecordKind::Qso,
                SyncableRecord::new(id, updated).with_parent("op"),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn successful_cycle_marks_sent_records() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_local(RecordKind::Operation, SyncableRecord::new("op", 1))
            .unwrap();
        dirty_qso(&store, "q1", 2);
        let engine = engine(store.clone());

        let report = engine.sync_once(SyncMode::Large).await.unwrap();
        assert_eq!(report.qsos_sent, 1);
        assert_eq!(report.operations_sent, 1);
        assert!(report.is_complete());
        assert!(report.cursor.completed_full_sync);
        assert_eq!(store.count_dirty(RecordKind::Qso).unwrap(), 0);
        assert_eq!(store.count_dirty(RecordKind::Operation).unwrap(), 0);
        assert_eq!(store.load_cursor().unwrap(), report.cursor);
        assert_eq!(engine.stats().cycles_completed, 1);
        assert!(!engine.is_locked());
    }

    #[tokio::test]
    async fn failed_cycle_commits_nothing() {
        let store = Arc::new(MemoryStore::new());
        dirty_qso(&store, "q1", 2);
        let engine = engine(store.clone());
        engine.transport().push_outcome(MockOutcome::Reject(500));

        let err = engine.sync_once(SyncMode::Small).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: Some(500) }));
        assert_eq!(store.count_dirty(RecordKind::Qso).unwrap(), 1);
        assert_eq!(store.load_cursor().unwrap(), SyncCursor::new());

        let stats = engine.stats();
        assert_eq!(stats.cycles_failed, 1);
        assert_eq!(stats.last_error_class, Some(ErrorClass::Transport));
    }

    #[tokio::test]
    async fn accepted_response_without_body_fails() {
        let store = Arc::new(MemoryStore::new());
        dirty_qso(&store, "q1", 2);
        let engine = engine(store.clone());
        engine.transport().push_outcome(MockOutcome::Malformed);

        let err = engine.sync_once(SyncMode::Small).await.unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert_eq!(store.count_dirty(RecordKind::Qso).unwrap(), 1);
    }

    #[tokio::test]
    async fn full_batch_is_not_complete() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            dirty_qso(&store, &format!("q{i}"), i + 10);
        }
        let engine = engine(store.clone());

        let first = engine.sync_once(SyncMode::Small).await.unwrap();
        assert_eq!(first.qsos_sent, 2);
        assert!(!first.is_complete());
        assert!(!first.cursor.completed_full_sync);

        let second = engine.sync_once(SyncMode::Small).await.unwrap();
        assert_eq!(second.qsos_sent, 1);
        assert!(second.is_complete());
    }

    #[tokio::test]
    async fn cursor_advances_to_newest_received() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        engine.transport().push_response(SyncResponseBody::new(
            vec![RemoteRecord::from_local(&SyncableRecord::new("op", 40))],
            vec![RemoteRecord::from_local(
                &SyncableRecord::new("q", 70).with_parent("op"),
            )],
        ));

        let report = engine.sync_once(SyncMode::Large).await.unwrap();
        assert_eq!(report.cursor.last_operation_synced_at_millis, 40);
        assert_eq!(report.cursor.last_qso_synced_at_millis, 70);
        assert_eq!(engine.cursor(), report.cursor);

        let requests = engine.transport().requests();
        assert!(requests[0].meta.sync.qsos.any_client);
    }

    #[tokio::test]
    async fn settings_sent_until_confirmed() {
        let store = Arc::new(MemoryStore::new());
        store.set_settings(json!({"grid": "FN31"})).unwrap();
        let engine = engine(store.clone());
        engine.transport().push_network_error("offline");

        assert!(engine.sync_once(SyncMode::Small).await.is_err());
        assert!(!store.settings_synced().unwrap());

        let report = engine.sync_once(SyncMode::Small).await.unwrap();
        assert!(report.settings_sent);
        assert!(store.settings_synced().unwrap());

        engine.sync_once(SyncMode::Small).await.unwrap();
        let requests = engine.transport().requests();
        assert!(requests[0].settings.is_some());
        assert!(requests[1].settings.is_some());
        assert!(requests[2].settings.is_none());
    }

    #[tokio::test]
    async fn operations_only_cycle_uses_ratio_limit() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..4 {
            store
                .upsert_local(RecordKind::Operation, SyncableRecord::new(format!("op{i}"), i))
                .unwrap();
        }
        let engine = engine(store.clone());

        let report = engine.sync_once(SyncMode::Small).await.unwrap();
        assert_eq!(report.qsos_sent, 0);
        assert_eq!(report.operations_sent, 4);
        assert!(report.is_complete());
        assert_eq!(store.count_dirty(RecordKind::Operation).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_replaced_in_flight_are_sent_again() {
        let store = Arc::new(MemoryStore::new());
        store.set_settings(json!({"grid": "OLD"})).unwrap();
        let engine = Arc::new(engine(store.clone()));
        engine.transport().set_latency(Duration::from_secs(1));

        let cycle = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.sync_once(SyncMode::Small).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.set_settings(json!({"grid": "NEW"})).unwrap();

        let report = cycle.await.unwrap().unwrap();
        assert!(report.settings_sent);
        assert!(!store.settings_synced().unwrap());

        engine.sync_once(SyncMode::Small).await.unwrap();
        assert!(store.settings_synced().unwrap());
        let requests = engine.transport().requests();
        assert_eq!(requests[0].settings, Some(json!({"grid": "OLD"})));
        assert_eq!(requests[1].settings, Some(json!({"grid": "NEW"})));
    }

    #[tokio::test]
    async fn disabled_engine_refuses_cycles() {
        let engine = engine(Arc::new(MemoryStore::new()));
        engine.set_enabled(false);
        assert!(matches!(
            engine.sync_once(SyncMode::Small).await,
            Err(SyncError::Disabled)
        ));
        assert_eq!(engine.transport().request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_caller_gets_busy() {
        let engine = Arc::new(engine(Arc::new(MemoryStore::new())));
        engine.transport().set_latency(Duration::from_secs(1));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_once(SyncMode::Small).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.is_locked());
        assert!(matches!(
            engine.sync_once(SyncMode::Small).await,
            Err(SyncError::Busy)
        ));

        first.await.unwrap().unwrap();
        assert!(!engine.is_locked());
        assert_eq!(engine.transport().max_in_flight(), 1);
    }
}
