//! Whole-cycle retry policy.

use crate::config::RetryConfig;
use std::time::Duration;

/// What to do after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the whole cycle after `delay`.
    Retry {
        /// Consecutive failures so far.
        attempt: u32,
        /// Wait before the retry.
        delay: Duration,
    },
    /// Stop retrying until the next external trigger.
    GiveUp {
        /// Consecutive failures that led here.
        attempts: u32,
    },
}

/// Counts consecutive failed cycles.
///
/// The counter lives in memory only. After a restart the dirty records
/// are simply selected again.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl RetryPolicy {
    /// Creates a policy with no failures recorded.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Returns the number of consecutive failures.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failure and decides whether to retry.
    ///
    /// Giving up resets the counter so the next external trigger starts
    /// from zero.
    pub fn on_failure(&mut self) -> RetryDecision {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt < self.config.max_attempts {
            RetryDecision::Retry {
                attempt: self.attempt,
                delay: self.config.delay_for_attempt(self.attempt),
            }
        } else {
            let attempts = self.attempt;
            self.attempt = 0;
            RetryDecision::GiveUp { attempts }
        }
    }

    /// Records a success.
    pub fn on_success(&mut self) {
        self.attempt = 0;
    }

    /// Forgets all recorded failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_with_growing_delay() {
        let mut policy = RetryPolicy::new(RetryConfig::new(8).with_base_delay(Duration::from_secs(1)));

        assert_eq!(
            policy.on_failure(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(
            policy.on_failure(),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(policy.attempt(), 2);

        policy.on_success();
        assert_eq!(policy.attempt(), 0);
    }

    #[test]
    fn gives_up_after_max_attempts_and_resets() {
        let mut policy = RetryPolicy::new(RetryConfig::new(8));

        for expected in 1..8 {
            assert!(matches!(
                policy.on_failure(),
                RetryDecision::Retry { attempt, .. } if attempt == expected
            ));
        }
        assert_eq!(policy.on_failure(), RetryDecision::GiveUp { attempts: 8 });
        assert_eq!(policy.attempt(), 0);

        assert!(matches!(
            policy.on_failure(),
            RetryDecision::Retry { attempt: 1, .. }
        ));
    }
}
