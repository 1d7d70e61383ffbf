//! Resync command implementation.

use crate::error::CliResult;
use hamlog_store::{FileStore, SyncStore};
use std::path::Path;

/// Runs the resync command.
pub fn run(path: &Path) -> CliResult<()> {
    let store = FileStore::open(path)?;
    let before = store.load_cursor()?;
    store.reset_cursor()?;
    tracing::info!(
        operations = before.last_operation_synced_at_millis,
        qsos = before.last_qso_synced_at_millis,
        "sync cursor reset"
    );
    println!("Cursor reset; the next sync pulls the whole logbook again.");
    Ok(())
}
