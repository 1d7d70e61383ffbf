//! The background task that drives the loop controller.

use crate::config::SyncMode;
use crate::controller::{CycleOutcome, LoopController, Phase};
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use crate::watchdog::Watchdog;
use hamlog_store::SyncStore;
use hamlog_sync_protocol::SyncCursor;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Snapshot of the loop published after every state change.
#[derive(Debug, Clone)]
pub struct LoopStatus {
    /// Controller phase.
    pub phase: Phase,
    /// Whether sync is enabled.
    pub enabled: bool,
    /// Consecutive failed cycles.
    pub attempt: u32,
    /// Cursor as of the last cycle.
    pub cursor: SyncCursor,
    /// Committed cycles so far.
    pub cycles_completed: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

#[derive(Debug)]
enum Command {
    Trigger(SyncMode),
    SetEnabled(bool),
    Shutdown,
}

/// Handle to a running sync loop.
///
/// Dropping the handle stops the loop after the current cycle.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<LoopStatus>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Asks for a sync after a local change.
    ///
    /// Never blocks and never fails; triggers sent after shutdown are
    /// dropped.
    pub fn trigger(&self, mode: SyncMode) {
        let _ = self.commands.send(Command::Trigger(mode));
    }

    /// Switches sync on or off.
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.commands.send(Command::SetEnabled(enabled));
    }

    /// Returns the latest status.
    pub fn status(&self) -> LoopStatus {
        self.status.borrow().clone()
    }

    /// Returns a receiver that sees every status change.
    pub fn subscribe(&self) -> watch::Receiver<LoopStatus> {
        self.status.clone()
    }

    /// Stops the loop and waits for it.
    ///
    /// A cycle in flight is allowed to finish first.
    pub async fn shutdown(self) -> SyncResult<()> {
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|_| SyncError::Shutdown)
    }
}

/// Spawns sync loops.
pub struct SyncLoop;

impl SyncLoop {
    /// Spawns the loop for `engine` on the current tokio runtime.
    pub fn spawn<T, S>(engine: Arc<SyncEngine<T, S>>) -> SyncHandle
    where
        T: SyncTransport + 'static,
        S: SyncStore + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let controller = LoopController::new(engine.config());
        let (status_tx, status) = watch::channel(snapshot(&controller, &engine));
        let task = tokio::spawn(run(engine, controller, receiver, status_tx));
        SyncHandle {
            commands,
            status,
            task,
        }
    }
}

fn snapshot<T: SyncTransport, S: SyncStore>(
    controller: &LoopController,
    engine: &SyncEngine<T, S>,
) -> LoopStatus {
    let stats = engine.stats();
    LoopStatus {
        phase: controller.phase(),
        enabled: controller.is_enabled(),
        attempt: controller.attempt(),
        cursor: engine.cursor(),
        cycles_completed: stats.cycles_completed,
        last_error: stats.last_error,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn apply_command<T: SyncTransport, S: SyncStore>(
    command: Command,
    controller: &mut LoopController,
    engine: &SyncEngine<T, S>,
) -> bool {
    match command {
        Command::Trigger(mode) => {
            tracing::trace!(%mode, "sync triggered");
            controller.on_trigger(mode, Instant::now());
        }
        Command::SetEnabled(enabled) => {
            tracing::info!(enabled, "sync switched");
            engine.set_enabled(enabled);
            controller.set_enabled(enabled);
        }
        Command::Shutdown => return false,
    }
    true
}

async fn run<T, S>(
    engine: Arc<SyncEngine<T, S>>,
    mut controller: LoopController,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<LoopStatus>,
) where
    T: SyncTransport + 'static,
    S: SyncStore + 'static,
{
    let config = engine.config();
    let watchdog = Watchdog::new(config.watchdog_tick, config.check_period);
    let started_at = Instant::now();
    let mut ticker = tokio::time::interval_at(started_at + watchdog.tick(), watchdog.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut running = true;
    while running {
        status.send_replace(snapshot(&controller, &engine));

        let start = tokio::select! {
            command = commands.recv() => {
                running = command.is_some_and(|c| apply_command(c, &mut controller, &engine));
                None
            }
            () = wait_until(controller.next_deadline()) => controller.on_deadline(Instant::now()),
            _ = ticker.tick() => {
                let now = Instant::now();
                let last_success = engine.stats().last_success;
                if watchdog.is_due(controller.is_enabled(), last_success, started_at, now) {
                    controller.on_watchdog(now)
                } else {
                    None
                }
            }
        };

        let Some(mode) = start else { continue };
        status.send_replace(snapshot(&controller, &engine));

        // The cycle is never cancelled; commands arriving meanwhile only
        // touch the controller, which latches triggers while running.
        let cycle = engine.sync_once(mode);
        tokio::pin!(cycle);
        let result = loop {
            tokio::select! {
                result = &mut cycle => break result,
                command = commands.recv(), if running => {
                    running = command.is_some_and(|c| apply_command(c, &mut controller, &engine));
                }
            }
        };

        let outcome = match &result {
            Ok(report) if report.is_complete() => CycleOutcome::Drained,
            Ok(_) => CycleOutcome::Backlog,
            Err(SyncError::Busy | SyncError::Disabled) => CycleOutcome::Skipped,
            Err(_) => CycleOutcome::Failed,
        };
        controller.on_cycle_finished(outcome, Instant::now());
        tracing::debug!(?outcome, phase = controller.phase().name(), "cycle finished");
    }

    status.send_replace(snapshot(&controller, &engine));
    tracing::debug!("sync loop stopped");
}
