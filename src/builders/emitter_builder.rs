//! Builder for [`Emitter`](crate::emitter::Emitter) configuration.
//!
//! Exposes the store address, the target list, queue sizing, timeouts, and
//! reconnection backoff parameters.

use std::{num::NonZeroU32, time::Duration};

use crate::emitter::{BackoffPolicy, Emitter, EmitterConfig, RedisConnector, StoreAddress};

use super::{BuildError, ensure_positive, option_setter};

/// Overrides for the reconnection backoff.
#[derive(Clone, Debug, Default)]
pub struct BackoffOverrides {
    min_ms: Option<u64>,
    max_ms: Option<u64>,
    max_attempts: Option<u32>,
    jitter: Option<bool>,
}

impl BackoffOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    option_setter!(
        #[doc = "Override the first (shortest) sleep in milliseconds."]
        with_min_ms,
        min_ms,
        u64
    );
    option_setter!(
        #[doc = "Override the sleep ceiling in milliseconds."]
        with_max_ms,
        max_ms,
        u64
    );
    option_setter!(
        #[doc = "Give up after this many consecutive failed attempts."]
        with_max_attempts,
        max_attempts,
        u32
    );
    option_setter!(with_jitter, jitter, bool);

    fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), BuildError> {
        if let Some(min) = self.min_ms {
            policy.min = Duration::from_millis(ensure_positive!(min, "backoff_min_ms")?);
        }
        if let Some(max) = self.max_ms {
            policy.max = Duration::from_millis(ensure_positive!(max, "backoff_max_ms")?);
        }
        if policy.min > policy.max {
            return Err(BuildError::InvalidConfig(format!(
                "backoff_min_ms ({}) must not exceed backoff_max_ms ({})",
                policy.min.as_millis(),
                policy.max.as_millis()
            )));
        }
        if let Some(attempts) = self.max_attempts {
            let attempts = ensure_positive!(attempts, "max_attempts")?;
            policy.max_attempts = NonZeroU32::new(attempts);
        }
        if let Some(jitter) = self.jitter {
            policy.jitter = jitter;
        }
        Ok(())
    }
}

/// Builder for emitter configuration.
#[derive(Clone, Debug, Default)]
pub struct EmitterBuilder {
    address: Option<String>,
    list_key: Option<String>,
    queue_capacity: Option<usize>,
    connect_timeout_ms: Option<u64>,
    io_timeout_ms: Option<u64>,
    report_interval: Option<u64>,
    warn_interval_ms: Option<u64>,
    backoff: BackoffOverrides,
}

impl EmitterBuilder {
    /// Create a builder with no store address configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store address: `host`, `host:port`, or a Unix socket path.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Name of the list records are appended to.
    pub fn with_list_key(mut self, key: impl Into<String>) -> Self {
        self.list_key = Some(key.into());
        self
    }

    option_setter!(
        #[doc = "Set the record queue's high-water mark."]
        with_queue_capacity,
        queue_capacity,
        usize
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_io_timeout_ms, io_timeout_ms, u64);
    option_setter!(
        #[doc = "Records between throughput reports; zero disables reporting."]
        with_report_interval,
        report_interval,
        u64
    );
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = overrides;
        self
    }

    fn validate(&self) -> Result<StoreAddress, BuildError> {
        let Some(address) = &self.address else {
            return Err(BuildError::InvalidConfig(
                "emitter requires a store address".into(),
            ));
        };
        if let Some(key) = &self.list_key
            && key.trim().is_empty()
        {
            return Err(BuildError::InvalidConfig("list key must not be empty".into()));
        }
        if let Some(capacity) = self.queue_capacity {
            ensure_positive!(capacity, "queue_capacity")?;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.io_timeout_ms {
            ensure_positive!(timeout, "io_timeout_ms")?;
        }
        if let Some(interval) = self.warn_interval_ms {
            ensure_positive!(interval, "warn_interval_ms")?;
        }
        Ok(StoreAddress::parse(address)?)
    }

    pub fn build_config(&self) -> Result<EmitterConfig, BuildError> {
        let address = self.validate()?;
        let mut config = EmitterConfig::default().with_address(address);
        if let Some(key) = &self.list_key {
            config.list_key = key.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        config.io_timeout = self.io_timeout_ms.map(Duration::from_millis);
        if let Some(interval) = self.report_interval {
            config.report_interval = interval;
        }
        if let Some(interval) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(interval);
        }
        self.backoff.apply(&mut config.backoff)?;
        Ok(config)
    }

    pub fn build(&self) -> Result<Emitter<RedisConnector>, BuildError> {
        Ok(Emitter::from_config(&self.build_config()?))
    }
}
