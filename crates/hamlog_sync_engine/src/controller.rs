//! The loop controller state machine.
//!
//! The controller decides *when* cycles run. It owns no timers and does no
//! I/O: the driver feeds it triggers, timer expiries and cycle outcomes and
//! arms exactly one timer for [`LoopController::next_deadline`].
//!
//! ```text
//!            trigger                deadline
//!   Idle ───────────────► Debouncing ────────► Running ──┬─ drained ──► Idle / Debouncing (rerun)
//!    ▲                        ▲                  ▲  ▲    ├─ backlog ──► Continuing ──► Running
//!    │                        └── trigger ───────┘  │    └─ failed ───► Backoff ─────► Running
//!    └──────────────────────── give up ─────────────┴──────────────────────┘
//! ```

use crate::config::{SyncConfig, SyncMode};
use crate::retry::{RetryDecision, RetryPolicy};
use std::time::Duration;
use tokio::time::Instant;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No timer pending, no cycle running.
    Idle,
    /// Waiting for triggers to settle.
    Debouncing {
        /// Mode of the pending cycle.
        mode: SyncMode,
        /// When the cycle starts unless pushed back.
        deadline: Instant,
        /// Arrival of the first coalesced trigger.
        first_trigger: Instant,
    },
    /// A cycle holds the exclusion slot.
    Running {
        /// Mode of the running cycle.
        mode: SyncMode,
        /// Set when a trigger arrived during the cycle.
        rerun: Option<SyncMode>,
    },
    /// Waiting to retry a failed cycle.
    Backoff {
        /// Mode of the failed cycle.
        mode: SyncMode,
        /// When the retry starts.
        deadline: Instant,
        /// Consecutive failures so far.
        attempt: u32,
    },
    /// Backlog remains; the next cycle is already scheduled.
    Continuing {
        /// When the continuation starts.
        deadline: Instant,
    },
}

impl Phase {
    /// Returns the phase name for logs and status output.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Debouncing { .. } => "debouncing",
            Phase::Running { .. } => "running",
            Phase::Backoff { .. } => "backoff",
            Phase::Continuing { .. } => "continuing",
        }
    }
}

/// How a cycle ended, as far as scheduling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Succeeded and both sides are drained.
    Drained,
    /// Succeeded with backlog left on either side.
    Backlog,
    /// Failed; a retry may follow.
    Failed,
    /// Did not run (sync disabled or slot held elsewhere).
    Skipped,
}

/// The scheduling state machine.
#[derive(Debug)]
pub struct LoopController {
    phase: Phase,
    enabled: bool,
    retry: RetryPolicy,
    debounce_delay: Duration,
    debounce_max_wait: Duration,
    loop_delay: Duration,
}

impl LoopController {
    /// Creates an idle controller.
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            phase: Phase::Idle,
            enabled: config.sync_enabled,
            retry: RetryPolicy::new(config.retry.clone()),
            debounce_delay: config.debounce_delay,
            debounce_max_wait: config.debounce_max_wait,
            loop_delay: config.loop_delay,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns whether sync is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns consecutive failed cycles.
    pub fn attempt(&self) -> u32 {
        self.retry.attempt()
    }

    /// Returns true while a cycle holds the slot.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    /// Returns the single pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Debouncing { deadline, .. }
            | Phase::Backoff { deadline, .. }
            | Phase::Continuing { deadline } => Some(deadline),
            Phase::Idle | Phase::Running { .. } => None,
        }
    }

    /// Switches sync on or off.
    ///
    /// Turning it off cancels any pending timer. A running cycle finishes
    /// but schedules nothing afterwards.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            return;
        }
        self.retry.reset();
        match &mut self.phase {
            Phase::Running { rerun, .. } => *rerun = None,
            phase => *phase = Phase::Idle,
        }
    }

    /// Records a trigger.
    pub fn on_trigger(&mut self, mode: SyncMode, now: Instant) {
        if !self.enabled {
            tracing::trace!(%mode, "sync disabled, trigger ignored");
            return;
        }

        let phase_name = self.phase.name();
        match &mut self.phase {
            phase @ Phase::Idle => {
                *phase = Phase::Debouncing {
                    mode,
                    deadline: now + self.debounce_delay,
                    first_trigger: now,
                };
            }
            Phase::Debouncing {
                mode: pending,
                deadline,
                first_trigger,
            } => {
                *pending = pending.coalesce(mode);
                let cap = *first_trigger + self.debounce_max_wait;
                *deadline = (now + self.debounce_delay).min(cap);
            }
            Phase::Running { rerun, .. } => {
                *rerun = Some(rerun.map_or(mode, |r| r.coalesce(mode)));
            }
            Phase::Backoff { .. } | Phase::Continuing { .. } => {
                tracing::trace!(%mode, phase = phase_name, "trigger absorbed");
            }
        }
    }

    /// Handles the deadline timer firing.
    ///
    /// Returns the mode of the cycle to start, if the pending deadline has
    /// passed. The caller must run exactly that cycle and report back
    /// through [`LoopController::on_cycle_finished`].
    pub fn on_deadline(&mut self, now: Instant) -> Option<SyncMode> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        let mode = match self.phase {
            Phase::Debouncing { mode, .. } | Phase::Backoff { mode, .. } => mode,
            Phase::Continuing { .. } => SyncMode::Large,
            Phase::Idle | Phase::Running { .. } => return None,
        };
        self.phase = Phase::Running { mode, rerun: None };
        Some(mode)
    }

    /// Handles a watchdog decision that a cycle is overdue.
    ///
    /// Returns the mode of the cycle to start. Pending backoff and
    /// continuation timers are left alone.
    pub fn on_watchdog(&mut self, now: Instant) -> Option<SyncMode> {
        if !self.enabled {
            return None;
        }
        let mode = match self.phase {
            Phase::Idle => SyncMode::Large,
            Phase::Debouncing { mode, .. } => mode,
            Phase::Running { .. } | Phase::Backoff { .. } | Phase::Continuing { .. } => {
                return None
            }
        };
        tracing::debug!(%mode, ?now, "watchdog forcing a cycle");
        self.phase = Phase::Running { mode, rerun: None };
        Some(mode)
    }

    /// Releases the slot after a cycle and schedules what comes next.
    pub fn on_cycle_finished(&mut self, outcome: CycleOutcome, now: Instant) {
        let Phase::Running { mode, rerun } = self.phase else {
            tracing::warn!(phase = self.phase.name(), "cycle finished outside running phase");
            return;
        };

        self.phase = Phase::Idle;
        if !self.enabled {
            return;
        }

        match outcome {
            CycleOutcome::Drained | CycleOutcome::Skipped => {
                if outcome == CycleOutcome::Drained {
                    self.retry.on_success();
                }
                if let Some(next) = rerun {
                    self.debounce(next, now);
                }
            }
            CycleOutcome::Backlog => {
                self.retry.on_success();
                tracing::debug!(delay = ?self.loop_delay, "backlog remains, continuing");
                self.phase = Phase::Continuing {
                    deadline: now + self.loop_delay,
                };
            }
            CycleOutcome::Failed => match self.retry.on_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    tracing::debug!(attempt, ?delay, "scheduling retry");
                    self.phase = Phase::Backoff {
                        mode,
                        deadline: now + delay,
                        attempt,
                    };
                }
                RetryDecision::GiveUp { attempts } => {
                    tracing::warn!(attempts, "sync keeps failing, giving up until next trigger");
                    // A trigger that arrived during the last attempt counts
                    // as the next external trigger.
                    if let Some(next) = rerun {
                        self.debounce(next, now);
                    }
                }
            },
        }
    }

    fn debounce(&mut self, mode: SyncMode, now: Instant) {
        self.phase = Phase::Debouncing {
            mode,
            deadline: now + self.debounce_delay,
            first_trigger: now,
        };
    }
}
