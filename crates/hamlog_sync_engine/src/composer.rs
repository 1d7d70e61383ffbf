//! Batch composition: turning a selection into a request.

use crate::config::{SyncConfig, SyncMode};
use crate::error::SyncResult;
use crate::selector::Selection;
use hamlog_store::SyncStore;
use hamlog_sync_protocol::{
    ClientInfo, RecordVersion, RemoteRecord, RequestMeta, SyncCursor, SyncRequest, SyncWindow,
    SyncableRecord,
};
use serde_json::Value;
use std::collections::BTreeSet;

/// The exact versions a request carries.
///
/// Only these are marked synced once the service accepted the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentSnapshot {
    /// QSO versions.
    pub qsos: Vec<RecordVersion>,
    /// Operation versions.
    pub operations: Vec<RecordVersion>,
    /// The settings blob attached, if any.
    pub settings: Option<Value>,
}

/// A request plus the bookkeeping needed to commit it.
#[derive(Debug, Clone)]
pub struct ComposedBatch {
    /// The request to send.
    pub request: SyncRequest,
    /// What the request carries.
    pub snapshot: SentSnapshot,
}

/// Builds the request for one cycle.
///
/// When QSOs were selected, their dirty parent Operations travel with
/// them so a QSO never arrives ahead of its parent's latest state.
/// `settings` is the blob to attach, if the service has not confirmed it yet.
pub fn compose<S: SyncStore + ?Sized>(
    store: &S,
    selection: Selection,
    cursor: &SyncCursor,
    settings: Option<Value>,
    config: &SyncConfig,
    mode: SyncMode,
) -> SyncResult<ComposedBatch> {
    let operation_limit = config.operation_batch_size(mode);

    let (qsos, operations) = match selection {
        Selection::Qsos(qsos) => {
            let parent_ids: Vec<String> = qsos
                .iter()
                .filter_map(|q| q.parent_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let parents = if parent_ids.is_empty() {
                Vec::new()
            } else {
                store.query_dirty_operations(operation_limit as usize, Some(&parent_ids))?
            };
            (qsos, parents)
        }
        Selection::Operations(operations) => (Vec::new(), operations),
    };

    let snapshot = SentSnapshot {
        qsos: qsos.iter().map(SyncableRecord::version).collect(),
        operations: operations.iter().map(SyncableRecord::version).collect(),
        settings: settings.clone(),
    };

    let meta = RequestMeta {
        consent: config.consent,
        sync: SyncWindow {
            operations: cursor.operations_window(operation_limit),
            qsos: cursor.qsos_window(config.batch_size(mode)),
        },
        client: config.client_id.clone().map(|id| ClientInfo { id }),
    };

    let request = SyncRequest {
        operations: operations.iter().map(RemoteRecord::from_local).collect(),
        qsos: qsos.iter().map(RemoteRecord::from_local).collect(),
        settings,
        meta,
    };

    tracing::debug!(
        qsos = request.qsos.len(),
        operations = request.operations.len(),
        settings = snapshot.settings.is_some(),
        any_client = request.meta.sync.qsos.any_client,
        "composed sync batch"
    );

    Ok(ComposedBatch { request, snapshot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{select_dirty, SelectionLimits};
    use hamlog_store::MemoryStore;
    use hamlog_sync_protocol::{Consent, RecordKind};
    use serde_json::json;

    fn config() -> SyncConfig {
        SyncConfig::new()
            .with_batch_sizes(2, 5)
            .with_operation_batch_ratio(5)
            .with_consent(Consent::new(true, true))
            .with_client_id("dev-1")
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_local(RecordKind::Operation, SyncableRecord::new("op-a", 1))
            .unwrap();
        store
            .upsert_local(RecordKind::Operation, SyncableRecord::new("op-b", 2))
            .unwrap();
        store
            .upsert_local(RecordKind::Operation, SyncableRecord::new("op-c", 3))
            .unwrap();
        store
            .upsert_local(
                RecordKind::Qso,
                SyncableRecord::new("q1", 10)
                    .with_parent("op-a")
                    .with_local(json!({"lookup": "cached"})),
            )
            .unwrap();
        store
            .upsert_local(
                RecordKind::Qso,
                SyncableRecord::new("q2", 11).with_parent("op-b"),
            )
            .unwrap();
        store
    }

    #[test]
    fn qsos_bring_only_their_dirty_parents() {
        let store = seeded();
        let config = config();
        let selection = select_dirty(
            &store,
            SelectionLimits {
                qsos: 2,
                operations: 10,
            },
        )
        .unwrap();

        let batch = compose(
            &store,
            selection,
            &SyncCursor::new(),
            None,
            &config,
            SyncMode::Small,
        )
        .unwrap();

        let ops: Vec<_> = batch.request.operations.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ops, vec!["op-b", "op-a"]);
        assert_eq!(batch.request.qsos.len(), 2);
        assert_eq!(batch.snapshot.qsos.len(), 2);
        assert_eq!(batch.snapshot.operations.len(), 2);
        assert!(batch.snapshot.settings.is_none());
    }

    #[test]
    fn local_fields_never_leave() {
        let store = seeded();
        let selection = Selection::Qsos(store.query_dirty_qsos(10).unwrap());
        let batch = compose(
            &store,
            selection,
            &SyncCursor::new(),
            None,
            &config(),
            SyncMode::Large,
        )
        .unwrap();

        let wire = serde_json::to_value(&batch.request).unwrap();
        for qso in wire["qsos"].as_array().unwrap() {
            assert!(qso.get("local").is_none());
        }
    }

    #[test]
    fn window_follows_cursor_and_mode() {
        let store = MemoryStore::new();
        let cursor = SyncCursor::new().advanced(Some(100), Some(200)).completed();
        let batch = compose(
            &store,
            Selection::Operations(vec![]),
            &cursor,
            Some(json!({"grid": "FN31"})),
            &config(),
            SyncMode::Large,
        )
        .unwrap();

        let window = batch.request.meta.sync;
        assert_eq!(window.operations.since_millis, 101);
        assert_eq!(window.operations.limit, 25);
        assert!(!window.operations.any_client);
        assert_eq!(window.qsos.since_millis, 201);
        assert_eq!(window.qsos.limit, 5);
        assert_eq!(batch.snapshot.settings, Some(json!({"grid": "FN31"})));
        assert_eq!(batch.request.settings, Some(json!({"grid": "FN31"})));
        assert_eq!(batch.request.meta.consent, Consent::new(true, true));
        assert_eq!(batch.request.client_id(), Some("dev-1"));
    }

    #[test]
    fn operations_selection_has_no_qsos() {
        let store = MemoryStore::new();
        let ops = vec![SyncableRecord::new("op", 1)];
        let batch = compose(
            &store,
            Selection::Operations(ops),
            &SyncCursor::new(),
            None,
            &config(),
            SyncMode::Small,
        )
        .unwrap();
        assert!(batch.request.qsos.is_empty());
        assert_eq!(batch.snapshot.operations[0].id, "op");
    }
}
