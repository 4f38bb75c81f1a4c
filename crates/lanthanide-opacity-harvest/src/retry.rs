//! Bounded retry with exponential backoff.

use std::time::Duration;

use crate::error::HarvestError;

/// Default attempts per grid point.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// How many times to try a grid point and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Retry immediately, without waiting.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether attempt number `attempt` failing with `error` warrants another.
    pub fn should_retry(&self, attempt: u32, error: &HarvestError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}
