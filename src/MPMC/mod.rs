mod builder;
mod channel;
mod consumer;
mod packet;
mod producer;

pub use builder::ChannelBuilder;
pub use channel::Channel;
pub use consumer::Consumer;
pub use packet::{Packet, PacketMode};
pub use producer::Producer;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{PacketBuffer, Slot}; // re-export for stable path
}

pub mod Structs {
    pub mod Buffer_Structs;
    pub use Buffer_Structs::{MessageHeader, MessageType, HEADER_SIZE}; // re-export for stable path
}
