// Header carried at the front of every packet in a channel

use std::fmt;

/// Size in bytes of an encoded [`MessageHeader`].
pub const HEADER_SIZE: usize = 8;

/// Message type tag stored in [`MessageHeader::message_type`].
///
/// Values below [`MessageType::USER`] are reserved for the pipeline itself.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct MessageType(pub u32);

impl MessageType {
    /// Unset / placeholder type.
    pub const NONE: MessageType = MessageType(0);
    /// End-of-stream sentinel. A stage terminates after processing it and is
    /// expected to forward it unchanged.
    pub const CLOSE: MessageType = MessageType(1);
    /// First type value available to stage authors.
    pub const USER: MessageType = MessageType(0x100);

    pub fn is_close(self) -> bool {
        self == Self::CLOSE
    }
}

impl fmt::Debug for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.write_str("NONE"),
            Self::CLOSE => f.write_str("CLOSE"),
            MessageType(v) => write!(f, "MessageType(0x{v:x})"),
        }
    }
}

/// Fixed-size record that prefixes every message.
/// ABI-stable; encoded little-endian on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    /// Type-specific metadata, conventionally the id of the stream the
    /// message belongs to.
    pub stream_id: u32,
}

impl MessageHeader {
    pub fn new(message_type: MessageType, stream_id: u32) -> Self {
        Self {
            message_type,
            stream_id,
        }
    }

    /// The end-of-stream sentinel header.
    pub fn close() -> Self {
        Self::new(MessageType::CLOSE, 0)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.message_type.0.to_le_bytes());
        out[4..].copy_from_slice(&self.stream_id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[..4]);
        let message_type = MessageType(u32::from_le_bytes(word));
        word.copy_from_slice(&bytes[4..]);
        Self {
            message_type,
            stream_id: u32::from_le_bytes(word),
        }
    }
}
