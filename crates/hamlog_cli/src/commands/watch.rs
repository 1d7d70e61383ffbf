//! Watch command implementation.

use super::open_engine;
use crate::error::CliResult;
use crate::knobs::SyncKnobs;
use hamlog_sync_engine::{SyncLoop, SyncMode};
use std::path::Path;
use std::sync::Arc;

/// Runs the background loop until Ctrl-C.
pub async fn run(path: &Path, url: &str, knobs: &SyncKnobs) -> CliResult<()> {
    let engine = Arc::new(open_engine(path, url, knobs)?);
    let handle = SyncLoop::spawn(engine);
    let mut status = handle.subscribe();
    println!("Watching {} (Ctrl-C to stop)", path.display());

    // Catch up on whatever changed while we were not running.
    handle.trigger(SyncMode::Large);

    let mut last_cycles = 0;
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.cycles_completed != last_cycles {
                    last_cycles = current.cycles_completed;
                    println!(
                        "  {} cycle(s) committed, qsos synced up to {}",
                        current.cycles_completed, current.cursor.last_qso_synced_at_millis
                    );
                }
                if let Some(err) = &current.last_error {
                    tracing::debug!(phase = current.phase.name(), attempt = current.attempt, error = %err, "loop status");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    println!("Stopping...");
    handle.shutdown().await?;
    Ok(())
}
