use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use log::info;
use parking_lot::Mutex;

use super::error::StageError;
use crate::MPMC::Buffer::PacketBuffer;
use crate::MPMC::Channel;

/// Process-wide pipeline state shared by every stage.
///
/// Cancelling a session is one-shot: workers observe the flag at their next
/// loop boundary, and every registered channel is cancelled so that workers
/// blocked inside a channel wake up instead of waiting for that boundary.
///
/// The registry holds weak references: a channel whose last handle is gone
/// is dropped from it on the next registration.
#[derive(Default)]
pub struct Session {
    cancelled: AtomicBool,
    channels: Mutex<Vec<Weak<PacketBuffer>>>,
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a channel to be cancelled together with the session. A channel
    /// registered after cancellation is cancelled immediately.
    pub fn register(&self, channel: &Channel) {
        let mut channels = self.channels.lock();
        if self.is_cancelled() {
            channel.cancel();
        }
        channels.retain(|known| known.strong_count() > 0);
        let buffer = channel.downgrade();
        if !channels.iter().any(|known| Weak::ptr_eq(known, &buffer)) {
            channels.push(buffer);
        }
    }

    pub fn cancel(&self) {
        let channels = self.channels.lock();
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            info!("session cancelled, waking {} channel(s)", channels.len());
        }
        for buffer in channels.iter().filter_map(Weak::upgrade) {
            buffer.cancel();
        }
    }

    /// Registered channels that are still alive.
    pub fn registered(&self) -> usize {
        self.channels
            .lock()
            .iter()
            .filter(|known| known.strong_count() > 0)
            .count()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancel the session on Ctrl+C.
    ///
    /// Only one handler can be installed per process; a second call fails with
    /// [`StageError::Signal`].
    pub fn cancel_on_interrupt(self: &Arc<Self>) -> Result<(), StageError> {
        let session = Arc::clone(self);
        ctrlc::set_handler(move || session.cancel())?;
        Ok(())
    }
}
