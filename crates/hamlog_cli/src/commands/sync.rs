//! Sync command implementation.

use super::open_engine;
use crate::error::CliResult;
use crate::knobs::SyncKnobs;
use hamlog_store::SyncStore;
use hamlog_sync_engine::SyncMode;
use hamlog_sync_protocol::RecordKind;
use std::path::Path;

/// Runs cycles until one completes or fails.
pub async fn run(path: &Path, url: &str, mode: SyncMode, knobs: &SyncKnobs) -> CliResult<()> {
    let engine = open_engine(path, url, knobs)?;
    let loop_delay = engine.config().loop_delay;
    println!("Syncing {} with {}", path.display(), url);

    let mut cycles = 0u64;
    let mut mode = mode;
    loop {
        let report = engine.sync_once(mode).await?;
        cycles += 1;
        println!(
            "  cycle {cycles}: sent {} qsos / {} operations, received {} qsos / {} operations",
            report.qsos_sent,
            report.operations_sent,
            report.merge.qsos_received,
            report.merge.operations_received,
        );
        if report.is_complete() {
            break;
        }
        // Continuation cycles always use the large batch.
        mode = SyncMode::Large;
        if !loop_delay.is_zero() {
            tokio::time::sleep(loop_delay).await;
        }
    }

    let store = engine.store();
    println!();
    println!(
        "Done after {cycles} cycle(s); {} qsos and {} operations still pending.",
        store.count_dirty(RecordKind::Qso)?,
        store.count_dirty(RecordKind::Operation)?
    );
    Ok(())
}
