//! Status command implementation.

use crate::error::CliResult;
use hamlog_store::{FileStore, SyncStore};
use hamlog_sync_protocol::{RecordKind, SyncCursor};
use serde::Serialize;
use std::path::Path;

/// What the store knows about sync progress.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Store path.
    pub path: String,
    /// Persisted cursor.
    pub cursor: SyncCursor,
    /// Operations with local changes.
    pub dirty_operations: usize,
    /// QSOs with local changes.
    pub dirty_qsos: usize,
    /// Whether the settings blob has been uploaded.
    pub settings_synced: bool,
}

/// Collects the status of an open store.
pub fn collect<S: SyncStore>(path: &Path, store: &S) -> CliResult<StatusReport> {
    Ok(StatusReport {
        path: path.display().to_string(),
        cursor: store.load_cursor()?,
        dirty_operations: store.count_dirty(RecordKind::Operation)?,
        dirty_qsos: store.count_dirty(RecordKind::Qso)?,
        settings_synced: store.settings_synced()?,
    })
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let store = FileStore::open(path)?;
    let report = collect(path, &store)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text(&report),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    println!("Store: {}", report.path);
    println!();
    println!("Cursor:");
    println!(
        "  Operations synced up to: {}",
        report.cursor.last_operation_synced_at_millis
    );
    println!(
        "  QSOs synced up to:       {}",
        report.cursor.last_qso_synced_at_millis
    );
    println!(
        "  Full sync completed:     {}",
        if report.cursor.completed_full_sync { "yes" } else { "no" }
    );
    println!();
    println!("Pending:");
    println!("  Operations: {}", report.dirty_operations);
    println!("  QSOs:       {}", report.dirty_qsos);
    println!(
        "  Settings:   {}",
        if report.settings_synced { "synced" } else { "pending" }
    );
}
