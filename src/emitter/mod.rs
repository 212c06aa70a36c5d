//! Delivery of framed records to the list store.
//!
//! The [`Emitter`] drains the record queue on its own thread and appends
//! every record to a named list in the store. Any failure drops the
//! connection; the emitter reconnects with exponential backoff and retries
//! the same record until it is acknowledged. Throughput is summarised to the
//! log every few thousand records.

pub mod address;
pub(crate) mod backoff;
mod config;
mod handle;
mod store;
mod throughput;
mod usage;
mod worker;


pub use address::{AddressError, DEFAULT_STORE_PORT, StoreAddress, StoreStream};
pub use backoff::BackoffState;
pub use config::{
    BackoffPolicy, DEFAULT_BACKOFF_MAX, DEFAULT_BACKOFF_MIN, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_LIST_KEY, DEFAULT_REPORT_INTERVAL, EmitterConfig,
};
pub use handle::EmitterHandle;
pub use store::{
    DeliveryError, FaultKind, MAX_BULK_LEN, RedisConnection, RedisConnector, StoreConnection,
    StoreConnector, read_ack, write_command,
};
pub use throughput::{LogReportSink, ReportSink, ThroughputCounter, ThroughputReport};
pub use usage::ResourceUsage;
pub use worker::{Emitter, EmitterError, EmitterStats};
