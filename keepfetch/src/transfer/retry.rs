//! Chunk retry policy.

use std::time::Duration;

use super::http::TransferError;

/// Default maximum attempts per chunk.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay after a rate-limit response.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(5);

/// Default delay after other transient failures.
pub const DEFAULT_TRANSIENT_DELAY: Duration = Duration::from_secs(2);

/// How a chunk transfer handles failures.
///
/// Rate-limit responses back off linearly (`attempt * rate_limit_delay`);
/// other retryable failures wait a fixed `transient_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Never fewer than one is made.
    pub max_attempts: u32,
    pub rate_limit_delay: Duration,
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            transient_delay: DEFAULT_TRANSIENT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Total attempts to make.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the attempt after `attempt` (1-based) failed with `error`.
    ///
    /// Returns `None` when the error is not retryable or attempts are used up.
    pub fn delay_for(&self, attempt: u32, error: &TransferError) -> Option<Duration> {
        if attempt >= self.attempts() || !error.is_retryable() {
            return None;
        }
        if error.is_rate_limited() {
            Some(self.rate_limit_delay * attempt)
        } else {
            Some(self.transient_delay)
        }
    }
}
