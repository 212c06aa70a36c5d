//! The delivery loop.
//!
//! The emitter is the only consumer of the record queue. It takes one record
//! at a time and keeps retrying it until the store acknowledges it, swapping
//! in a fresh connection after every failure. Records are never skipped.

use std::{io, thread};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{codec::FramedRecord, queue::QueueReceiver, rate_limited_warner::RateLimitedWarner};

use super::{
    backoff::BackoffState,
    config::{BackoffPolicy, EmitterConfig},
    store::{DeliveryError, RedisConnector, StoreConnection, StoreConnector},
    throughput::{LogReportSink, ReportSink, ThroughputCounter},
};

/// Reasons the emitter stops before its queue closes.
#[derive(Debug, Error)]
pub enum EmitterError {
    /// A configured attempt limit was reached while connecting or writing.
    #[error("gave up on {target} after {attempts} consecutive failures")]
    RetriesExhausted {
        target: String,
        attempts: u32,
        #[source]
        last: DeliveryError,
    },
    #[error("failed to spawn emitter thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("emitter thread panicked")]
    Panicked,
    #[error("emitter thread was already joined")]
    AlreadyJoined,
}

/// Totals accumulated over the emitter's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmitterStats {
    /// Records acknowledged by the store.
    pub delivered: u64,
    /// Payload bytes acknowledged by the store.
    pub bytes: u64,
    /// Writes that failed and were retried.
    pub failed_writes: u64,
    /// Connection attempts that failed.
    pub failed_connects: u64,
    /// Connections successfully established.
    pub connects: u64,
}

/// Drains a [`QueueReceiver`] into a store.
pub struct Emitter<C: StoreConnector> {
    connector: C,
    list_key: String,
    policy: BackoffPolicy,
    counter: ThroughputCounter,
    sink: Box<dyn ReportSink>,
    warner: RateLimitedWarner,
    stats: EmitterStats,
}

impl Emitter<RedisConnector> {
    pub fn from_config(config: &EmitterConfig) -> Self {
        let connector = RedisConnector::new(config.address.clone(), config.connect_timeout)
            .with_io_timeout(config.io_timeout);
        Self::new(connector, config.list_key.clone(), config.backoff.clone())
            .with_report_interval(config.report_interval)
            .with_warner(RateLimitedWarner::new(config.warn_interval))
    }
}

impl<C: StoreConnector> Emitter<C> {
    pub fn new(connector: C, list_key: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            connector,
            list_key: list_key.into(),
            policy,
            counter: ThroughputCounter::new(super::config::DEFAULT_REPORT_INTERVAL),
            sink: Box::new(LogReportSink),
            warner: RateLimitedWarner::default(),
            stats: EmitterStats::default(),
        }
    }

    /// Records between throughput reports; zero disables them.
    pub fn with_report_interval(mut self, interval: u64) -> Self {
        self.counter = ThroughputCounter::new(interval);
        self
    }

    pub fn with_report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_warner(mut self, warner: RateLimitedWarner) -> Self {
        self.warner = warner;
        self
    }

    /// Deliver records until every producer has hung up.
    ///
    /// The first connection is made before the first dequeue. Without an
    /// attempt limit this only returns once the queue is closed and drained.
    pub fn run(mut self, queue: QueueReceiver) -> Result<EmitterStats, EmitterError> {
        info!("emitter delivering to {} list {:?}", self.connector.describe(), self.list_key);
        let mut connection = Some(self.connect()?);
        while let Some(record) = queue.dequeue() {
            self.deliver(&mut connection, &record)?;
            self.stats.delivered += 1;
            self.stats.bytes += record.len() as u64;
            if let Some(report) = self.counter.record(record.len()) {
                self.sink.report(&report);
            }
        }
        info!(
            "record queue closed; emitter delivered {} records ({} bytes)",
            self.stats.delivered, self.stats.bytes
        );
        Ok(self.stats)
    }

    /// Retry `record` until it is acknowledged.
    ///
    /// A failed connection is dropped before its replacement is opened.
    /// Consecutive write failures share one backoff schedule, which resets
    /// once the record is acknowledged.
    fn deliver(
        &mut self,
        slot: &mut Option<C::Connection>,
        record: &FramedRecord,
    ) -> Result<(), EmitterError> {
        let mut backoff: Option<BackoffState> = None;
        loop {
            let mut connection = match slot.take() {
                Some(connection) => connection,
                None => self.connect()?,
            };
            match connection.append(&self.list_key, record.as_bytes()) {
                Ok(()) => {
                    *slot = Some(connection);
                    if let Some(backoff) = backoff {
                        let target = self.connector.describe();
                        self.warner.flush(|count| {
                            warn!("{count} further writes to {target} failed");
                        });
                        info!(
                            "write to {target} succeeded after {} failures",
                            backoff.attempts()
                        );
                    }
                    return Ok(());
                }
                Err(err) => {
                    drop(connection);
                    self.stats.failed_writes += 1;
                    let backoff =
                        backoff.get_or_insert_with(|| BackoffState::new(self.policy.clone()));
                    let delay = backoff.next_sleep();
                    let target = self.connector.describe();
                    let kind = err.kind();
                    self.warner.record();
                    self.warner.warn_if_due(|count| {
                        warn!(
                            "write to {target} failed ({kind:?}, {count} failures since last \
                             report): {err}; reconnecting in {delay:?}"
                        );
                    });
                    if backoff.exhausted() {
                        return Err(EmitterError::RetriesExhausted {
                            target,
                            attempts: backoff.attempts(),
                            last: err,
                        });
                    }
                    thread::sleep(delay);
                }
            }
        }
    }

    /// Open a connection, sleeping with backoff between failures.
    fn connect(&mut self) -> Result<C::Connection, EmitterError> {
        let mut backoff = BackoffState::new(self.policy.clone());
        loop {
            match self.connector.connect() {
                Ok(connection) => {
                    self.stats.connects += 1;
                    if backoff.attempts() > 0 {
                        let target = self.connector.describe();
                        self.warner.flush(|count| {
                            warn!("{count} further connection attempts to {target} failed");
                        });
                        info!(
                            "connected to {target} after {} failed attempts",
                            backoff.attempts()
                        );
                    } else {
                        debug!("connected to {}", self.connector.describe());
                    }
                    return Ok(connection);
                }
                Err(err) => {
                    self.stats.failed_connects += 1;
                    let delay = backoff.next_sleep();
                    let target = self.connector.describe();
                    self.warner.record();
                    self.warner.warn_if_due(|count| {
                        warn!(
                            "connection to {target} failed ({count} attempts since last report): \
                             {err}; retrying in {delay:?}"
                        );
                    });
                    if backoff.exhausted() {
                        return Err(EmitterError::RetriesExhausted {
                            target,
                            attempts: backoff.attempts(),
                            last: err,
                        });
                    }
                    thread::sleep(delay);
                }
            }
        }
    }
}

impl<C: StoreConnector> std::fmt::Debug for Emitter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("target", &self.connector.describe())
            .field("list_key", &self.list_key)
            .field("policy", &self.policy)
            .field("stats", &self.stats)
            .finish()
    }
}
