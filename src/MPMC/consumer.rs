// src/MPMC/consumer.rs

use super::Packet;
use super::Structs::{MessageHeader, HEADER_SIZE};
use crate::Core::error::ChannelError;
use std::time::Duration;

/// Reads whole messages out of a channel.
pub struct Consumer {
    packet: Packet,
    channel_id: u32,
    received: u64,
}

impl Consumer {
    pub(crate) fn new(packet: Packet, channel_id: u32) -> Self {
        Self {
            packet,
            channel_id,
            received: 0,
        }
    }

    /// Receives a message, blocking until one is available.
    ///
    /// # Returns
    /// * `Ok((header, payload))` for the next message
    /// * `Err(ChannelError::Cancelled)` if the channel was cancelled
    pub fn receive(&mut self) -> Result<(MessageHeader, Vec<u8>), ChannelError> {
        self.packet.open_read()?;
        self.take()
    }

    /// Receives a message, waiting up to the specified timeout.
    ///
    /// # Returns
    /// * `Ok(Some((header, payload)))` if a message was received
    /// * `Ok(None)` if the timeout was reached
    pub fn receive_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<(MessageHeader, Vec<u8>)>, ChannelError> {
        if !self.packet.open_read_timeout(timeout)? {
            return Ok(None);
        }
        self.take().map(Some)
    }

    fn take(&mut self) -> Result<(MessageHeader, Vec<u8>), ChannelError> {
        let result = self.read_open();
        self.packet.close();
        if result.is_ok() {
            self.received += 1;
        }
        result
    }

    fn read_open(&mut self) -> Result<(MessageHeader, Vec<u8>), ChannelError> {
        let size = self.packet.size()?;
        if size < HEADER_SIZE {
            return Err(ChannelError::Truncated {
                size,
                header: HEADER_SIZE,
            });
        }
        let mut header = [0u8; HEADER_SIZE];
        self.packet.read(&mut header)?;
        let payload = self.packet.map_read(size - HEADER_SIZE)?.to_vec();
        Ok((MessageHeader::from_bytes(&header), payload))
    }

    /// Returns the channel ID for this consumer
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    /// Number of messages received so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}
