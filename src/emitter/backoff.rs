//! Exponential backoff used between reconnection attempts.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

/// Sleep schedule for one run of consecutive connection failures.
///
/// A fresh state is created for every reconnect episode, so success resets
/// the schedule implicitly.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    attempts: u32,
    rng: StdRng,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.min,
            attempts: 0,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Interval the next failure will sleep for (before jitter).
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Whether the policy's attempt budget is spent.
    pub fn exhausted(&self) -> bool {
        self.policy
            .max_attempts
            .is_some_and(|max| self.attempts >= max.get())
    }

    /// Record a failure and return how long to sleep before the next attempt.
    ///
    /// The interval doubles on each call and is clamped to `[min, max]`.
    pub fn next_sleep(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let interval = self.current.max(self.policy.min).min(self.policy.max);
        self.current = interval.saturating_mul(2).min(self.policy.max);

        if self.policy.jitter && interval > self.policy.min {
            let lo = self.policy.min.as_millis().min(u128::from(u64::MAX)) as u64;
            let hi = interval.as_millis().min(u128::from(u64::MAX)) as u64;
            return Duration::from_millis(self.rng.gen_range(lo..=hi));
        }
        interval
    }
}

impl std::fmt::Debug for BackoffState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffState")
            .field("current", &self.current)
            .field("attempts", &self.attempts)
            .finish()
    }
}
