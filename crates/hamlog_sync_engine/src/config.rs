//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use hamlog_sync_protocol::Consent;
use std::time::Duration;

/// How much data a cycle should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// A quick cycle right after a user action.
    Small,
    /// A bulk cycle for background catch-up.
    Large,
}

impl SyncMode {
    /// Parses `"small"` or `"large"`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Some(SyncMode::Small),
            "large" => Some(SyncMode::Large),
            _ => None,
        }
    }

    /// Returns the mode that wins when two triggers are coalesced.
    ///
    /// A pending small cycle is kept small so the user's change goes out
    /// quickly; continuation cycles switch to large batches anyway.
    #[must_use]
    pub fn coalesce(self, other: SyncMode) -> SyncMode {
        if self == SyncMode::Small || other == SyncMode::Small {
            SyncMode::Small
        } else {
            SyncMode::Large
        }
    }

    /// Returns the mode name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Small => "small",
            SyncMode::Large => "large",
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Master switch; when off, triggers and the watchdog are ignored.
    pub sync_enabled: bool,
    /// QSO batch size for small cycles.
    pub small_batch_size: u32,
    /// QSO batch size for large cycles.
    pub large_batch_size: u32,
    /// How many Operations fit in the space of one QSO.
    pub operation_batch_ratio: u32,
    /// Quiet period required after the last trigger.
    pub debounce_delay: Duration,
    /// Longest a trigger may be postponed by newer ones.
    pub debounce_max_wait: Duration,
    /// Pause before a continuation cycle when backlog remains.
    pub loop_delay: Duration,
    /// Force a cycle when no cycle succeeded for this long.
    pub check_period: Duration,
    /// How often the watchdog looks at the clock.
    pub watchdog_tick: Duration,
    /// Consent flags sent with every request.
    pub consent: Consent,
    /// Id of this device, sent with every request.
    pub client_id: Option<String>,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            sync_enabled: true,
            small_batch_size: 10,
            large_batch_size: 50,
            operation_batch_ratio: 5,
            debounce_delay: Duration::from_millis(500),
            debounce_max_wait: Duration::from_secs(3),
            loop_delay: Duration::ZERO,
            check_period: Duration::from_secs(60),
            watchdog_tick: Duration::from_secs(5),
            consent: Consent::default(),
            client_id: None,
            retry: RetryConfig::default(),
        }
    }

    /// Returns the QSO batch size for a mode.
    pub fn batch_size(&self, mode: SyncMode) -> u32 {
        match mode {
            SyncMode::Small => self.small_batch_size,
            SyncMode::Large => self.large_batch_size,
        }
    }

    /// Returns the Operation batch size for a mode.
    pub fn operation_batch_size(&self, mode: SyncMode) -> u32 {
        self.batch_size(mode)
            .saturating_mul(self.operation_batch_ratio)
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.small_batch_size == 0 || self.large_batch_size == 0 {
            return Err(SyncError::Config("batch sizes must be positive".into()));
        }
        if self.operation_batch_ratio == 0 {
            return Err(SyncError::Config(
                "operation batch ratio must be positive".into(),
            ));
        }
        if self.debounce_max_wait < self.debounce_delay {
            return Err(SyncError::Config(format!(
                "debounce max wait {:?} is shorter than debounce delay {:?}",
                self.debounce_max_wait, self.debounce_delay
            )));
        }
        if self.watchdog_tick.is_zero() {
            return Err(SyncError::Config("watchdog tick must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config("retry max attempts must be positive".into()));
        }
        Ok(())
    }

    /// Enables or disables sync.
    #[must_use]
    pub fn with_sync_enabled(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }

    /// Sets the small and large QSO batch sizes.
    #[must_use]
    pub fn with_batch_sizes(mut self, small: u32, large: u32) -> Self {
        self.small_batch_size = small;
        self.large_batch_size = large;
        self
    }

    /// Sets the Operation batch ratio.
    #[must_use]
    pub fn with_operation_batch_ratio(mut self, ratio: u32) -> Self {
        self.operation_batch_ratio = ratio;
        self
    }

    /// Sets the debounce delay and maximum wait.
    #[must_use]
    pub fn with_debounce(mut self, delay: Duration, max_wait: Duration) -> Self {
        self.debounce_delay = delay;
        self.debounce_max_wait = max_wait;
        self
    }

    /// Sets the pause before continuation cycles.
    #[must_use]
    pub fn with_loop_delay(mut self, delay: Duration) -> Self {
        self.loop_delay = delay;
        self
    }

    /// Sets the watchdog threshold.
    #[must_use]
    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = period;
        self
    }

    /// Sets the watchdog tick.
    #[must_use]
    pub fn with_watchdog_tick(mut self, tick: Duration) -> Self {
        self.watchdog_tick = tick;
        self
    }

    /// Sets the consent flags.
    #[must_use]
    pub fn with_consent(mut self, consent: Consent) -> Self {
        self.consent = consent;
        self
    }

    /// Sets the device id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// The delay before retry `n` (1-based) is `base_delay + 2^n` seconds.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Consecutive failures after which automatic retries stop.
    pub max_attempts: u32,
    /// Constant part of every backoff delay.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Sets the constant part of the delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Calculates the delay before the given attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // 2^31 s is already far beyond any sane delay.
        let exponential = Duration::from_secs(1u64 << attempt.min(31));
        self.base_delay.saturating_add(exponential)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(8)
    }
}
