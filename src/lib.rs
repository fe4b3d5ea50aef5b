// Module naming follows project convention (MPMC = Multi-Producer Multi-Consumer)
#[allow(non_snake_case)]
pub mod MPMC;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Stage;

pub use Core::{CallbackError, ChannelError, Hook, Session, StageError};
pub use MPMC::Structs::{MessageHeader, MessageType, HEADER_SIZE};
pub use MPMC::{Channel, ChannelBuilder, Packet};
pub use Stage::{
    spawn_stage, CallbackResult, StageBuilder, StageCallbacks, StageConfig, StageFlags,
    StageHandle, StateFlags, WorkerState,
};
