//! Configuration consumed by the emitter at construction time.
//!
//! [`EmitterBuilder`](crate::builders::EmitterBuilder) validates user input
//! and produces these values.

use std::{num::NonZeroU32, time::Duration};

use crate::{queue::DEFAULT_HIGH_WATER_MARK, rate_limited_warner::DEFAULT_WARN_INTERVAL};

use super::address::{DEFAULT_STORE_PORT, StoreAddress};

/// List the records are appended to when none is configured.
pub const DEFAULT_LIST_KEY: &str = "lumberjack";
/// Timeout for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Shortest sleep between reconnection attempts.
pub const DEFAULT_BACKOFF_MIN: Duration = Duration::from_millis(100);
/// Longest sleep between reconnection attempts.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(10);
/// Delivered records between throughput reports.
pub const DEFAULT_REPORT_INTERVAL: u64 = 10_000;

#[derive(Clone, Debug)]
pub struct EmitterConfig {
    pub address: StoreAddress,
    pub list_key: String,
    pub queue_capacity: usize,
    pub connect_timeout: Duration,
    /// Per-write timeout. `None` leaves it to the transport.
    pub io_timeout: Option<Duration>,
    pub backoff: BackoffPolicy,
    pub report_interval: u64,
    pub warn_interval: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            address: StoreAddress::Tcp {
                host: "localhost".into(),
                port: DEFAULT_STORE_PORT,
            },
            list_key: DEFAULT_LIST_KEY.into(),
            queue_capacity: DEFAULT_HIGH_WATER_MARK,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: None,
            backoff: BackoffPolicy::default(),
            report_interval: DEFAULT_REPORT_INTERVAL,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl EmitterConfig {
    /// Point the emitter at a different store, e.g. a tunnel's rendezvous
    /// socket.
    pub fn with_address(mut self, address: StoreAddress) -> Self {
        self.address = address;
        self
    }
}

/// Reconnection timing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
    /// Draw each sleep uniformly from `[min, current]` instead of sleeping
    /// for exactly `current`.
    pub jitter: bool,
    /// Consecutive failed attempts tolerated before giving up. `None`
    /// retries forever.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: DEFAULT_BACKOFF_MIN,
            max: DEFAULT_BACKOFF_MAX,
            jitter: false,
            max_attempts: None,
        }
    }
}
