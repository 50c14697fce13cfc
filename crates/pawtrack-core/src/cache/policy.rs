// ── Per-entry scheduling policy ──

use std::time::Duration;

/// Bounded retry with capped exponential delay.
///
/// `retries = n` allows up to `n` further attempts after the first
/// failure; the `k`-th retry waits `min(base * 2^k, max)`. Authorization
/// failures are never retried regardless of this policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Fail on the first error.
    pub const NONE: Self = Self {
        retries: 0,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    pub const fn retries(retries: u32) -> Self {
        Self {
            retries,
            ..Self::NONE
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// How one cache entry is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryConfig {
    /// Background refetch period. `None` refetches only on invalidation.
    pub refetch_interval: Option<Duration>,
    pub retry: RetryPolicy,
    /// How long a successful result is served without refetching.
    pub stale_time: Duration,
    /// Disabled entries never fetch, not even on explicit access.
    pub enabled: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            refetch_interval: None,
            retry: RetryPolicy::NONE,
            stale_time: Duration::ZERO,
            enabled: true,
        }
    }
}

impl EntryConfig {
    pub fn every(mut self, interval: Duration) -> Self {
        self.refetch_interval = Some(interval);
        self
    }

    pub fn retry(mut self, retries: u32) -> Self {
        self.retry = RetryPolicy::retries(retries);
        self
    }

    pub fn stale_for(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
