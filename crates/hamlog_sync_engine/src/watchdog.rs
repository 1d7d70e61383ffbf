//! Low-frequency check that forces a cycle when sync has been quiet too long.

use std::time::Duration;
use tokio::time::Instant;

/// Decides on every tick whether a cycle is overdue.
///
/// A forced cycle runs even with no local changes, which is how changes
/// made on other devices reach an otherwise idle one.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    tick: Duration,
    threshold: Duration,
}

impl Watchdog {
    /// Creates a watchdog.
    pub fn new(tick: Duration, threshold: Duration) -> Self {
        Self { tick, threshold }
    }

    /// Returns how often the watchdog runs.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Returns the quiet time after which a cycle is forced.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Returns true if a cycle should be forced now.
    ///
    /// Before the first success, time is measured from `started_at`.
    pub fn is_due(
        &self,
        enabled: bool,
        last_success: Option<Instant>,
        started_at: Instant,
        now: Instant,
    ) -> bool {
        if !enabled {
            return false;
        }
        let since = last_success.unwrap_or(started_at);
        now.saturating_duration_since(since) > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_after_threshold() {
        let watchdog = Watchdog::new(Duration::from_secs(5), Duration::from_secs(60));
        let start = Instant::now();

        assert!(!watchdog.is_due(true, None, start, start + Duration::from_secs(60)));
        assert!(watchdog.is_due(true, None, start, start + Duration::from_secs(61)));
    }

    #[test]
    fn measured_from_last_success() {
        let watchdog = Watchdog::new(Duration::from_secs(5), Duration::from_secs(10));
        let start = Instant::now();
        let success = start + Duration::from_secs(30);

        assert!(!watchdog.is_due(true, Some(success), start, success + Duration::from_secs(5)));
        assert!(watchdog.is_due(true, Some(success), start, success + Duration::from_secs(11)));
    }

    #[test]
    fn never_due_when_disabled() {
        let watchdog = Watchdog::new(Duration::from_secs(5), Duration::ZERO);
        let start = Instant::now();
        assert!(!watchdog.is_due(false, None, start, start + Duration::from_secs(3600)));
    }
}
