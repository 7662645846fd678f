//! Retry budget and exponential backoff.

use std::time::Duration;

const BACKOFF_MULTIPLIER: u32 = 2;

/// How many extra attempts the dispatcher makes and how long it waits between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; zero disables sleeping entirely
    pub initial_backoff: Duration,
    /// Upper bound for any single delay; zero means unbounded
    pub max_backoff: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryBudget {
    /// Build a budget from a possibly negative configured retry count.
    /// Negative counts are clamped to zero.
    #[must_use]
    pub fn new(max_retries: i64, initial_backoff: Duration, max_backoff: Duration) -> Self {
        let max_retries = u32::try_from(max_retries.max(0)).unwrap_or(u32::MAX);
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// A single attempt, no retries
    #[must_use]
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Total number of attempts, including the first
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff policy matching this budget
    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.initial_backoff, self.max_backoff)
    }
}

/// Stateless exponential backoff calculator (multiplier 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
}

impl BackoffPolicy {
    /// Create a policy starting at `initial` and capped at `max`
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay to wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        if self.initial.is_zero() {
            return Duration::ZERO;
        }
        let factor = BACKOFF_MULTIPLIER.checked_pow(retry).unwrap_or(u32::MAX);
        let raw = self.initial.saturating_mul(factor);
        if self.max.is_zero() {
            raw
        } else {
            raw.min(self.max)
        }
    }

    /// Endless sequence of delays, one per retry
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..).map(move |retry| self.delay(retry))
    }
}
