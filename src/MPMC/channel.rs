use std::fmt;
use std::sync::{Arc, Weak};

use super::Buffer::PacketBuffer;
use super::{Consumer, Packet, Producer};

/// Handle to a bounded packet channel.
///
/// Cloning the handle is cheap; every clone refers to the same buffer. Any
/// number of threads may read from and write to a channel concurrently, each
/// through its own [`Packet`] context.
#[derive(Clone)]
pub struct Channel {
    buffer: Arc<PacketBuffer>,
    channel_id: u32,
}

impl Channel {
    pub(crate) fn new(buffer: PacketBuffer, channel_id: u32) -> Self {
        Self {
            buffer: Arc::new(buffer),
            channel_id,
        }
    }

    /// Create a packet context for the calling worker.
    pub fn packet(&self) -> Packet {
        Packet::new(self.buffer.clone())
    }

    pub fn producer(&self) -> Producer {
        Producer::new(self.packet(), self.channel_id)
    }

    pub fn consumer(&self) -> Consumer {
        Consumer::new(self.packet(), self.channel_id)
    }

    /// Cancel the channel. Every caller blocked in it, now or later, fails with
    /// `ChannelError::Cancelled`. Idempotent.
    pub fn cancel(&self) {
        self.buffer.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.buffer.is_cancelled()
    }

    /// Packets opened by writers and not yet claimed by readers.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of packet slots.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }

    pub fn max_packet_size(&self) -> usize {
        self.buffer.max_packet_size
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Reference to the buffer that does not keep it alive.
    pub(crate) fn downgrade(&self) -> Weak<PacketBuffer> {
        Arc::downgrade(&self.buffer)
    }

    /// Whether two handles refer to the same buffer.
    pub fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("channel_id", &self.channel_id)
            .field("capacity", &self.buffer.capacity)
            .field("max_packet_size", &self.buffer.max_packet_size)
            .finish_non_exhaustive()
    }
}
