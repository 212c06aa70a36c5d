//! Ship log lines from local files to a list in a Redis-compatible store.
//!
//! Harvester threads read files and encode each line as a [`FieldSet`]
//! packed into a [`FramedRecord`]. Records flow through a bounded queue to a
//! single [`Emitter`], which appends them to the store and retries through
//! any outage without dropping a record. When ssl options are set the
//! emitter talks to the store through a local `stunnel` relay.

pub mod builders;
pub mod codec;
pub mod emitter;
pub mod harvester;
pub mod queue;
pub mod rate_limited_warner;
pub mod settings;
pub mod tunnel;

#[cfg(test)]
mod test_utils;

pub use builders::{BackoffOverrides, BuildError, EmitterBuilder, TunnelBuilder};
pub use codec::{CodecError, Field, FieldSet, FramedRecord, decode, encode};
pub use emitter::{
    BackoffPolicy, DeliveryError, Emitter, EmitterConfig, EmitterError, EmitterHandle,
    EmitterStats, StoreAddress,
};
pub use harvester::{HarvestError, HarvestStats, Harvester};
pub use queue::{DEFAULT_HIGH_WATER_MARK, QueueClosed, QueueReceiver, QueueSender, record_queue};
pub use rate_limited_warner::RateLimitedWarner;
pub use settings::{ConfigError, Settings};
pub use tunnel::{TunnelConfig, TunnelError, TunnelProcess};
