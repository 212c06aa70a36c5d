//! Rate limiting for warnings that repeat during an outage.
//!
//! While the store is unreachable the emitter fails a connection attempt on
//! every backoff tick. Logging each one would flood the operational log, so
//! failures are counted and summarised at most once per interval.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Default spacing between summarised warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Counts events and lets a warning through at most once per interval.
///
/// Call [`record`](Self::record) for every occurrence, then
/// [`warn_if_due`](Self::warn_if_due) with a callback receiving the number of
/// occurrences since the last emitted warning. The first warning is emitted
/// immediately.
pub struct RateLimitedWarner {
    origin: Instant,
    interval_ms: u64,
    last_warn_ms: AtomicU64,
    pending: AtomicU64,
}

impl RateLimitedWarner {
    pub fn new(interval: Duration) -> Self {
        let interval_ms = interval.as_millis().min(u128::from(u64::MAX)) as u64;
        Self {
            origin: Instant::now(),
            interval_ms,
            // u64::MAX marks "never warned".
            last_warn_ms: AtomicU64::new(u64::MAX),
            pending: AtomicU64::new(0),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
    }

    /// Count one occurrence.
    pub fn record(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Occurrences counted since the last emitted warning.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Emit a warning if the interval has elapsed and anything is pending.
    pub fn warn_if_due(&self, warn: impl FnOnce(u64)) {
        let now = self.elapsed_ms();
        let prev = self.last_warn_ms.load(Ordering::Relaxed);
        let due = prev == u64::MAX || now.saturating_sub(prev) >= self.interval_ms;
        if !due {
            return;
        }
        let count = self.pending.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn_ms.store(now, Ordering::Relaxed);
        }
    }

    /// Emit any pending count immediately, ignoring the interval.
    pub fn flush(&self, warn: impl FnOnce(u64)) {
        let count = self.pending.swap(0, Ordering::Relaxed);
        if count > 0 {
            warn(count);
            self.last_warn_ms.store(self.elapsed_ms(), Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

impl std::fmt::Debug for RateLimitedWarner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedWarner")
            .field("interval_ms", &self.interval_ms)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn emits_first_warning_immediately() {
        let warner = RateLimitedWarner::new(Duration::from_secs(60));
        let mut warnings = Vec::new();
        warner.record();
        warner.warn_if_due(|c| warnings.push(c));
        assert_eq!(warnings, vec![1]);
    }

    #[rstest]
    fn suppresses_within_interval_and_accumulates() {
        let warner = RateLimitedWarner::new(Duration::from_secs(60));
        let mut warnings = Vec::new();
        warner.record();
        warner.warn_if_due(|c| warnings.push(c));
        warner.record();
        warner.record();
        warner.warn_if_due(|c| warnings.push(c));
        assert_eq!(warnings, vec![1]);
        assert_eq!(warner.pending(), 2);
    }

    #[rstest]
    fn warns_again_after_interval() {
        let warner = RateLimitedWarner::new(Duration::from_millis(20));
        let mut warnings = Vec::new();
        warner.record();
        warner.warn_if_due(|c| warnings.push(c));
        warner.record();
        std::thread::sleep(Duration::from_millis(30));
        warner.warn_if_due(|c| warnings.push(c));
        assert_eq!(warnings, vec![1, 1]);
    }

    #[rstest]
    fn flush_emits_pending_warning() {
        let warner = RateLimitedWarner::new(Duration::from_secs(60));
        let mut warnings = Vec::new();
        warner.record();
        warner.warn_if_due(|c| warnings.push(c));
        warner.record();
        warner.flush(|c| warnings.push(c));
        assert_eq!(warnings, vec![1, 1]);
        assert_eq!(warner.pending(), 0);
    }
}
