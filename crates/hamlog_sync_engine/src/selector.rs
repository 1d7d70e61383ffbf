//! Dirty-record selection.

use crate::error::SyncResult;
use hamlog_store::SyncStore;
use hamlog_sync_protocol::{RecordKind, SyncableRecord};

/// Upper bounds for one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    /// Maximum QSOs.
    pub qsos: usize,
    /// Maximum Operations when no QSO is dirty.
    ///
    /// The engine passes batch size times the operation ratio here, so an
    /// Operations-only cycle may carry more records than the QSO limit.
    pub operations: usize,
}

/// The primary records picked for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Dirty QSOs, newest first. Their parents are added by the composer.
    Qsos(Vec<SyncableRecord>),
    /// Dirty Operations, newest first. Only chosen when no QSO is dirty.
    Operations(Vec<SyncableRecord>),
}

impl Selection {
    /// Returns the primary kind.
    pub fn kind(&self) -> RecordKind {
        match self {
            Selection::Qsos(_) => RecordKind::Qso,
            Selection::Operations(_) => RecordKind::Operation,
        }
    }

    /// Returns the number of selected records.
    pub fn len(&self) -> usize {
        match self {
            Selection::Qsos(records) | Selection::Operations(records) => records.len(),
        }
    }

    /// Returns true if nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Selects the dirty records a cycle should carry.
///
/// QSOs take priority; Operations are only selected on their own once
/// every QSO is clean. Tombstones are ordinary dirty records here.
pub fn select_dirty<S: SyncStore + ?Sized>(
    store: &S,
    limits: SelectionLimits,
) -> SyncResult<Selection> {
    let qsos = store.query_dirty_qsos(limits.qsos)?;
    if !qsos.is_empty() {
        tracing::trace!(count = qsos.len(), "selected dirty qsos");
        return Ok(Selection::Qsos(qsos));
    }

    let operations = store.query_dirty_operations(limits.operations, None)?;
    tracing::trace!(count = operations.len(), "selected dirty operations");
    Ok(Selection::Operations(operations))
}
