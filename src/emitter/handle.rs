//! Thread ownership for a running [`Emitter`].

use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::queue::QueueReceiver;

use super::{
    store::StoreConnector,
    worker::{Emitter, EmitterError, EmitterStats},
};

type EmitterResult = Result<EmitterStats, EmitterError>;

/// Handle to the emitter thread.
///
/// Dropping the handle detaches the thread; it keeps draining the queue
/// until the last producer hangs up.
pub struct EmitterHandle {
    handle: Mutex<Option<JoinHandle<EmitterResult>>>,
}

impl EmitterHandle {
    /// Start `emitter` on a dedicated thread, consuming `queue`.
    pub fn spawn<C>(emitter: Emitter<C>, queue: QueueReceiver) -> Result<Self, EmitterError>
    where
        C: StoreConnector + 'static,
    {
        let handle = thread::Builder::new()
            .name("lumberjack-emitter".into())
            .spawn(move || emitter.run(queue))
            .map_err(EmitterError::Spawn)?;
        Ok(Self {
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Whether the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }

    /// Wait for the thread and return what the emitter returned.
    pub fn join(&self) -> EmitterResult {
        let Some(handle) = self.handle.lock().take() else {
            return Err(EmitterError::AlreadyJoined);
        };
        handle.join().unwrap_or_else(|_| {
            log::warn!("emitter thread panicked");
            Err(EmitterError::Panicked)
        })
    }
}

impl std::fmt::Debug for EmitterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
