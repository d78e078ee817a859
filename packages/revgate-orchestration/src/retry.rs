use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Conflict retry policy for the write engine
///
/// Only conflicts consume retries; not-found and hard errors never do. The
/// default retries forever without delay: under sustained contention a write
/// may spin, so callers that need bounded latency either cap `max_retries` or
/// wrap the call in `tokio::time::timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Conflicts tolerated before giving up (None = unbounded)
    pub max_retries: Option<u32>,
    /// Delay after the first conflict, doubled after each further one
    pub base_backoff: Duration,
    /// Upper bound on the delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// Retry every conflict immediately, forever
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_backoff = base;
        self.max_backoff = max.max(base);
        self
    }

    /// May the engine retry after its `conflicts`-th conflict?
    pub fn allows(&self, conflicts: u32) -> bool {
        self.max_retries.map_or(true, |max| conflicts <= max)
    }

    /// Delay before retrying after the `conflicts`-th conflict (1-based)
    pub fn backoff_for(&self, conflicts: u32) -> Duration {
        if self.base_backoff.is_zero() || conflicts == 0 {
            return Duration::ZERO;
        }

        let mut delay = self.base_backoff;
        for _ in 1..conflicts {
            delay = delay.saturating_mul(2);
            if delay >= self.max_backoff {
                return self.max_backoff;
            }
        }
        delay.min(self.max_backoff)
    }
}
