//! In-memory store contents shared by the store implementations.

use crate::error::{StoreError, StoreResult};
use crate::store::{CommitSummary, CycleCommit};
use hamlog_sync_protocol::{RecordKind, RecordVersion, RemoteRecord, SyncCursor, SyncableRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Complete contents of a store.
///
/// [`crate::FileStore`] persists this document as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    /// Operations by id.
    #[serde(default)]
    pub operations: BTreeMap<String, SyncableRecord>,
    /// QSOs by id.
    #[serde(default)]
    pub qsos: BTreeMap<String, SyncableRecord>,
    /// Settings blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Whether the settings blob was confirmed by the service.
    #[serde(default)]
    pub settings_synced: bool,
    /// Persisted sync cursor.
    #[serde(default)]
    pub cursor: SyncCursor,
}

impl StoreState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: RecordKind) -> &BTreeMap<String, SyncableRecord> {
        match kind {
            RecordKind::Operation => &self.operations,
            RecordKind::Qso => &self.qsos,
        }
    }

    fn table_mut(&mut self, kind: RecordKind) -> &mut BTreeMap<String, SyncableRecord> {
        match kind {
            RecordKind::Operation => &mut self.operations,
            RecordKind::Qso => &mut self.qsos,
        }
    }

    /// Dirty, non-historical QSOs, newest start first.
    pub fn dirty_qsos(&self, limit: usize) -> Vec<SyncableRecord> {
        newest_first(
            self.qsos
                .values()
                .filter(|r| !r.synced && !r.is_historical()),
            limit,
        )
    }

    /// Dirty Operations, newest start first, optionally among an id set.
    pub fn dirty_operations(&self, limit: usize, among: Option<&[String]>) -> Vec<SyncableRecord> {
        match among {
            Some(ids) => {
                let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
                newest_first(
                    self.operations
                        .values()
                        .filter(|r| !r.synced && ids.contains(r.id.as_str())),
                    limit,
                )
            }
            None => newest_first(self.operations.values().filter(|r| !r.synced), limit),
        }
    }

    /// Looks up a record.
    pub fn get(&self, kind: RecordKind, id: &str) -> Option<&SyncableRecord> {
        self.table(kind).get(id)
    }

    /// Writes a remote record in place, confirmed, when it is strictly newer
    /// than the local row.
    ///
    /// Returns `false` when the local row was as new or newer and was kept.
    pub fn merge(&mut self, kind: RecordKind, record: RemoteRecord) -> bool {
        let table = self.table_mut(kind);
        let local = match table.get(&record.id) {
            Some(existing) if existing.updated_at_millis >= record.updated_at_millis => {
                return false;
            }
            Some(existing) => existing.local.clone(),
            None => None,
        };
        let mut merged = record.into_local(true);
        merged.local = local;
        table.insert(merged.id.clone(), merged);
        true
    }

    /// Applies a cycle commit.
    pub fn commit(&mut self, commit: &CycleCommit) -> CommitSummary {
        let mut summary = CommitSummary::default();
        mark_versions(&mut self.qsos, &commit.qsos, &mut summary);
        mark_versions(&mut self.operations, &commit.operations, &mut summary);
        // A blob replaced while in flight stays unsynced.
        if commit.settings.is_some() && commit.settings == self.settings {
            self.settings_synced = true;
        }
        self.cursor = commit.cursor;
        summary
    }

    /// Stores a locally edited record as dirty.
    ///
    /// An edit of an existing row always moves `updated_at_millis` forward,
    /// so a version sent earlier never matches the edited row.
    pub fn upsert_local(&mut self, kind: RecordKind, mut record: SyncableRecord) {
        record.synced = false;
        let table = self.table_mut(kind);
        if let Some(previous) = table.get(&record.id) {
            record.updated_at_millis = record
                .updated_at_millis
                .max(previous.updated_at_millis.saturating_add(1));
        }
        table.insert(record.id.clone(), record);
    }

    /// Soft-deletes a record locally.
    pub fn delete_local(&mut self, kind: RecordKind, id: &str, now_millis: i64) -> StoreResult<()> {
        let record = self
            .table_mut(kind)
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(kind, id))?;
        record.deleted = true;
        record.synced = false;
        record.updated_at_millis = now_millis.max(record.updated_at_millis.saturating_add(1));
        Ok(())
    }

    /// Replaces the settings blob.
    pub fn set_settings(&mut self, settings: Value) {
        self.settings = Some(settings);
        self.settings_synced = false;
    }

    /// Counts dirty records of a kind.
    pub fn count_dirty(&self, kind: RecordKind) -> usize {
        self.table(kind).values().filter(|r| !r.synced).count()
    }
}

fn newest_first<'a>(
    records: impl Iterator<Item = &'a SyncableRecord>,
    limit: usize,
) -> Vec<SyncableRecord> {
    let mut selected: Vec<&SyncableRecord> = records.collect();
    selected.sort_by(|a, b| {
        b.started_at_millis
            .cmp(&a.started_at_millis)
            .then_with(|| a.id.cmp(&b.id))
    });
    selected.into_iter().take(limit).cloned().collect()
}

fn mark_versions(
    table: &mut BTreeMap<String, SyncableRecord>,
    versions: &[RecordVersion],
    summary: &mut CommitSummary,
) {
    for version in versions {
        match table.get_mut(&version.id) {
            Some(record) if record.updated_at_millis == version.updated_at_millis => {
                if !record.synced {
                    record.synced = true;
                    summary.marked += 1;
                }
            }
            // Edited again while in flight, or replaced by a newer merge.
            Some(record) if !record.synced => summary.stale += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamlog_sync_protocol::HISTORICAL_OPERATION_ID;
    use proptest::prelude::*;
    use serde_json::json;

    fn qso(id: &str, started: i64) -> SyncableRecord {
        SyncableRecord::new(id, started)
            .with_parent("op-1")
            .with_started_at(started)
    }

    #[test]
    fn dirty_qsos_newest_first_without_historical() {
        let mut state = StoreState::new();
        state.upsert_local(RecordKind::Qso, qso("a", 10));
        state.upsert_local(RecordKind::Qso, qso("b", 30));
        state.upsert_local(RecordKind::Qso, qso("c", 20));
        state.upsert_local(
            RecordKind::Qso,
            SyncableRecord::new("h", 99).with_parent(HISTORICAL_OPERATION_ID),
        );

        let ids: Vec<_> = state.dirty_qsos(10).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(state.dirty_qsos(1).len(), 1);
    }

    #[test]
    fn dirty_operations_among_ids() {
        let mut state = StoreState::new();
        state.upsert_local(RecordKind::Operation, SyncableRecord::new("op-1", 1));
        state.upsert_local(RecordKind::Operation, SyncableRecord::new("op-2", 2));
        state.upsert_local(RecordKind::Operation, SyncableRecord::new("op-3", 3));

        let among = vec!["op-1".to_string(), "op-3".to_string(), "op-9".to_string()];
        let ids: Vec<_> = state
            .dirty_operations(10, Some(&among))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["op-3", "op-1"]);
    }

    #[test]
    fn merge_keeps_local_fields() {
        let mut state = StoreState::new();
        state.upsert_local(
            RecordKind::Qso,
            qso("q", 1).with_local(json!({"cache": 1})),
        );

        let mut remote = RemoteRecord::from_local(&qso("q", 1));
        remote.updated_at_millis = 5;
        state.merge(RecordKind::Qso, remote);

        let merged = state.get(RecordKind::Qso, "q").unwrap();
        assert!(merged.synced);
        assert_eq!(merged.updated_at_millis, 5);
        assert_eq!(merged.local, Some(json!({"cache": 1})));
    }

    #[test]
    fn commit_skips_versions_edited_in_flight() {
        let mut state = StoreState::new();
        state.upsert_local(RecordKind::Qso, qso("a", 1));
        state.upsert_local(RecordKind::Qso, qso("b", 1));
        let sent = vec![
            state.get(RecordKind::Qso, "a").unwrap().version(),
            state.get(RecordKind::Qso, "b").unwrap().version(),
        ];

        // "b" is edited while the request is in flight.
        let mut edited = qso("b", 1);
        edited.updated_at_millis = 2;
        state.upsert_local(RecordKind::Qso, edited);

        let cursor = SyncCursor::new().advanced(Some(3), Some(4));
        let summary = state.commit(&CycleCommit {
            qsos: sent,
            operations: vec![],
            settings: None,
            cursor,
        });

        assert_eq!(summary, CommitSummary { marked: 1, stale: 1 });
        assert!(state.get(RecordKind::Qso, "a").unwrap().synced);
        assert!(!state.get(RecordKind::Qso, "b").unwrap().synced);
        assert_eq!(state.cursor, cursor);
    }

    #[test]
    fn delete_local_is_dirty_tombstone() {
        let mut state = StoreState::new();
        state.merge(
            RecordKind::Operation,
            RemoteRecord::from_local(&SyncableRecord::new("op", 10)),
        );
        state.delete_local(RecordKind::Operation, "op", 5).unwrap();

        let record = state.get(RecordKind::Operation, "op").unwrap();
        assert!(record.deleted);
        assert!(!record.synced);
        assert!(record.updated_at_millis > 10);
        assert!(state.delete_local(RecordKind::Qso, "missing", 1).is_err());
    }

    #[test]
    fn settings_flag_follows_edits() {
        let mut state = StoreState::new();
        state.set_settings(json!({"call": "N0CALL"}));
        assert!(!state.settings_synced);
        state.commit(&CycleCommit {
            settings: Some(json!({"call": "N0CALL"})),
            ..CycleCommit::default()
        });
        assert!(state.settings_synced);
        state.set_settings(json!({"call": "N0CALL/P"}));
        assert!(!state.settings_synced);
    }

    #[test]
    fn settings_replaced_in_flight_stay_unsynced() {
        let mut state = StoreState::new();
        state.set_settings(json!({"grid": "OLD"}));
        let sent = state.settings.clone();
        state.set_settings(json!({"grid": "NEW"}));

        state.commit(&CycleCommit {
            settings: sent,
            ..CycleCommit::default()
        });
        assert!(!state.settings_synced);
        assert_eq!(state.settings, Some(json!({"grid": "NEW"})));
    }

    #[test]
    fn merge_keeps_newer_or_equal_local_row() {
        let mut state = StoreState::new();
        state.upsert_local(
            RecordKind::Qso,
            qso("q", 1).with_data(json!({"call": "LOCAL"})),
        );
        let mut edited = qso("q", 1).with_data(json!({"call": "LOCAL"}));
        edited.updated_at_millis = 100;
        state.upsert_local(RecordKind::Qso, edited);

        let mut older = RemoteRecord::from_local(&qso("q", 1));
        older.updated_at_millis = 50;
        older.data = json!({"call": "REMOTE"});
        assert!(!state.merge(RecordKind::Qso, older.clone()));

        older.updated_at_millis = 100;
        assert!(!state.merge(RecordKind::Qso, older.clone()));

        let kept = state.get(RecordKind::Qso, "q").unwrap();
        assert_eq!(kept.updated_at_millis, 100);
        assert_eq!(kept.data, json!({"call": "LOCAL"}));
        assert!(!kept.synced);

        older.updated_at_millis = 101;
        assert!(state.merge(RecordKind::Qso, older));
        assert!(state.get(RecordKind::Qso, "q").unwrap().synced);
    }

    #[test]
    fn same_millisecond_edit_is_not_marked_by_earlier_send() {
        let mut state = StoreState::new();
        state.upsert_local(RecordKind::Qso, qso("q", 7).with_data(json!({"rst": "559"})));
        let sent = vec![state.get(RecordKind::Qso, "q").unwrap().version()];

        // Second edit lands with the same clock reading.
        state.upsert_local(RecordKind::Qso, qso("q", 7).with_data(json!({"rst": "599"})));
        let edited = state.get(RecordKind::Qso, "q").unwrap();
        assert_eq!(edited.updated_at_millis, 8);

        let summary = state.commit(&CycleCommit {
            qsos: sent,
            ..CycleCommit::default()
        });
        assert_eq!(summary, CommitSummary { marked: 0, stale: 1 });
        assert_eq!(state.count_dirty(RecordKind::Qso), 1);
    }

    proptest! {
        #[test]
        fn dirty_query_respects_limit_and_order(
            starts in prop::collection::vec(0i64..1_000, 0..40),
            limit in 0usize..20,
        ) {
            let mut state = StoreState::new();
            for (i, start) in starts.iter().enumerate() {
                state.upsert_local(RecordKind::Qso, qso(&format!("q{i}"), *start));
            }
            let selected = state.dirty_qsos(limit);
            prop_assert!(selected.len() <= limit);
            prop_assert_eq!(selected.len(), limit.min(starts.len()));
            for pair in selected.windows(2) {
                prop_assert!(pair[0].started_at_millis >= pair[1].started_at_millis);
            }
        }
    }
}
