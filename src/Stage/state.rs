use std::sync::Arc;

use super::config::StateFlags;
use crate::MPMC::Structs::MessageHeader;

/// Transient state of one worker, handed to every hook.
///
/// `header`, `read_size` and `write_size` describe the message in flight.
/// Hooks may rewrite the header and the write size before the output packet
/// is written; `flags` steer the current iteration only and are reset to the
/// stage defaults after the close hook.
#[derive(Debug)]
pub struct WorkerState<L> {
    pub header: MessageHeader,
    /// Payload bytes of the input packet, header excluded.
    pub read_size: usize,
    /// Payload bytes of the output packet, header excluded. Starts equal to
    /// `read_size`; the write hook may shrink it.
    pub write_size: usize,
    pub flags: StateFlags,
    /// Worker-private data that lives as long as the worker.
    pub local: L,
    worker: usize,
    stage: Arc<str>,
}

impl<L: Default> WorkerState<L> {
    pub(crate) fn new(worker: usize, stage: Arc<str>, flags: StateFlags) -> Self {
        Self {
            header: MessageHeader::default(),
            read_size: 0,
            write_size: 0,
            flags,
            local: L::default(),
            worker,
            stage,
        }
    }
}

impl<L> WorkerState<L> {
    /// Index of this worker within its stage, `0..threads`.
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn skip_read(&mut self) {
        self.flags.insert(StateFlags::SKIP_READ);
    }

    pub fn skip_write(&mut self) {
        self.flags.insert(StateFlags::SKIP_WRITE);
    }
}
