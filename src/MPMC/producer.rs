// In src/MPMC/producer.rs
use super::Packet;
use super::Structs::{MessageHeader, HEADER_SIZE};
use crate::Core::error::ChannelError;

/// Writes whole messages into a channel.
///
/// A convenience for sources and tests that sit outside any stage; stage
/// workers drive their own [`Packet`] contexts.
pub struct Producer {
    packet: Packet,
    channel_id: u32,
    sent: u64,
}

impl Producer {
    pub(crate) fn new(packet: Packet, channel_id: u32) -> Self {
        Self {
            packet,
            channel_id,
            sent: 0,
        }
    }

    /// Sends one message, blocking while the channel is full.
    ///
    /// # Returns
    /// * `Ok(())` once the message is published
    /// * `Err(ChannelError::Cancelled)` if the channel was cancelled
    /// * `Err(ChannelError::PacketTooLarge)` if it does not fit in one packet
    pub fn send<T: AsRef<[u8]>>(&mut self, header: MessageHeader, payload: T) -> Result<(), ChannelError> {
        let payload = payload.as_ref();
        let total = HEADER_SIZE + payload.len();
        let max = self.packet.max_packet_size();
        if total > max {
            // rejected before a slot is claimed, nothing reaches readers
            return Err(ChannelError::PacketTooLarge {
                requested: total,
                max,
            });
        }
        self.packet.open_write()?;
        let result = self.fill(header, payload);
        // closed even on failure so the position does not stall readers
        self.packet.close();
        result?;
        self.sent += 1;
        Ok(())
    }

    fn fill(&mut self, header: MessageHeader, payload: &[u8]) -> Result<(), ChannelError> {
        self.packet.set_size(HEADER_SIZE + payload.len())?;
        self.packet.write(&header.to_bytes())?;
        self.packet.write(payload)
    }

    /// Sends the end-of-stream sentinel.
    pub fn send_close(&mut self) -> Result<(), ChannelError> {
        self.send(MessageHeader::close(), [0u8; 0])
    }

    /// Returns the channel ID for this producer
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Number of messages published so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
