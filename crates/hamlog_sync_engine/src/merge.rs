//! Applying inbound records to local storage.

use crate::error::SyncResult;
use hamlog_store::SyncStore;
use hamlog_sync_protocol::{RecordKind, RemoteRecord, SyncResponseBody};
use std::collections::BTreeMap;

/// What merging one response changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Operations in the response.
    pub operations_received: usize,
    /// QSOs in the response.
    pub qsos_received: usize,
    /// Records written to the store.
    pub applied: usize,
    /// Records dropped because the local copy was as new or newer.
    pub kept_local: usize,
    /// Malformed records that were skipped.
    pub invalid: usize,
    /// Newest Operation `updated_at_millis` in the response.
    pub operations_max_updated: Option<i64>,
    /// Newest QSO `updated_at_millis` in the response.
    pub qsos_max_updated: Option<i64>,
}

/// Merges a response into the store.
///
/// Operations are applied before QSOs so parents land first. A remote
/// record replaces the local one only when strictly newer; equal versions
/// keep the local row, so applying the same response twice is a no-op.
/// The maxima cover every record received, skipped ones included, so a
/// malformed record cannot pin the cursor.
pub fn apply_response<S: SyncStore + ?Sized>(
    store: &S,
    body: SyncResponseBody,
) -> SyncResult<MergeReport> {
    let mut report = MergeReport {
        operations_received: body.operations.len(),
        qsos_received: body.qsos.len(),
        ..MergeReport::default()
    };

    report.operations_max_updated =
        merge_kind(store, RecordKind::Operation, body.operations, &mut report)?;
    report.qsos_max_updated = merge_kind(store, RecordKind::Qso, body.qsos, &mut report)?;

    tracing::debug!(
        applied = report.applied,
        kept_local = report.kept_local,
        invalid = report.invalid,
        "merged sync response"
    );
    Ok(report)
}

fn merge_kind<S: SyncStore + ?Sized>(
    store: &S,
    kind: RecordKind,
    records: Vec<RemoteRecord>,
    report: &mut MergeReport,
) -> SyncResult<Option<i64>> {
    let mut max_updated: Option<i64> = None;
    let mut winners: BTreeMap<String, RemoteRecord> = BTreeMap::new();

    for record in records {
        max_updated = Some(max_updated.map_or(record.updated_at_millis, |m| {
            m.max(record.updated_at_millis)
        }));

        if let Err(err) = record.validate(kind) {
            tracing::warn!(%kind, id = %record.id, error = %err, "skipping malformed record");
            report.invalid += 1;
            continue;
        }

        // The same id may appear twice in one response.
        if let Some(pending) = winners.get(&record.id) {
            if pending.updated_at_millis >= record.updated_at_millis {
                report.kept_local += 1;
                continue;
            }
        }

        winners.insert(record.id.clone(), record);
    }

    // The store compares against the local row under its write lock.
    let candidates = winners.len();
    let applied = store.merge_records(kind, winners.into_values().collect())?;
    report.applied += applied;
    report.kept_local += candidates.saturating_sub(applied);
    Ok(max_updated)
}
