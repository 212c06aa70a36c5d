//! Bounded hand-off between harvesters and the emitter.
//!
//! Producers clone [`QueueSender`]; the single [`QueueReceiver`] belongs to
//! the emitter. The channel never drops a record: a full queue blocks the
//! producer until the emitter takes one off the other end.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::codec::FramedRecord;

/// Records buffered before producers block.
pub const DEFAULT_HIGH_WATER_MARK: usize = 100;

/// Build a queue holding at most `capacity` records.
///
/// A capacity of zero yields a rendezvous channel; builders reject it before
/// it gets here.
pub fn record_queue(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = bounded(capacity);
    (QueueSender { tx }, QueueReceiver { rx })
}

/// The receiving end was dropped, so nothing will ever drain the queue.
#[derive(Debug, thiserror::Error)]
#[error("record queue has no consumer")]
pub struct QueueClosed(pub FramedRecord);

/// Producer handle. Cheap to clone; one per harvester thread.
#[derive(Clone, Debug)]
pub struct QueueSender {
    tx: Sender<FramedRecord>,
}

impl QueueSender {
    /// Enqueue `record`, blocking while the queue is at its high-water mark.
    pub fn enqueue(&self, record: FramedRecord) -> Result<(), QueueClosed> {
        self.tx.send(record).map_err(|err| QueueClosed(err.into_inner()))
    }

    /// Number of records waiting for the emitter.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the emitter has caught up.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// High-water mark the queue was built with.
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Consumer handle owned by the emitter.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: Receiver<FramedRecord>,
}

impl QueueReceiver {
    /// Block until a record arrives.
    ///
    /// Returns `None` once every [`QueueSender`] is gone and the queue is
    /// drained.
    pub fn dequeue(&self) -> Option<FramedRecord> {
        self.rx.recv().ok()
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<FramedRecord, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Number of records waiting to be dequeued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no records are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
