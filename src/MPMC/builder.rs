use super::Buffer::layout::{DEFAULT_CAPACITY, DEFAULT_MAX_PACKET_SIZE};
use super::Buffer::PacketBuffer;
use super::Channel;
use super::Structs::HEADER_SIZE;
use crate::Core::error::StageError;

pub struct ChannelBuilder {
    capacity: usize,
    max_packet_size: usize,
    channel_id: u32,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            channel_id: 0, // Default channel ID
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packet slots. Must be a power of two.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Largest packet, header included, the channel accepts.
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    pub fn with_channel_id(mut self, channel_id: u32) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn build(self) -> Result<Channel, StageError> {
        if self.capacity == 0 || !self.capacity.is_power_of_two() {
            return Err(StageError::Configuration(format!(
                "channel capacity must be a power of two and greater than zero, got {}",
                self.capacity
            )));
        }
        if self.max_packet_size < HEADER_SIZE {
            return Err(StageError::Configuration(format!(
                "max packet size {} cannot hold a {HEADER_SIZE}-byte header",
                self.max_packet_size
            )));
        }

        let buffer = PacketBuffer::new(self.capacity, self.max_packet_size);
        Ok(Channel::new(buffer, self.channel_id))
    }
}
