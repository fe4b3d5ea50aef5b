mod callbacks;
mod config;
mod control;
mod manager;
mod state;
mod worker;

pub use callbacks::{CallbackResult, StageCallbacks};
pub use config::{StageBuilder, StageConfig, StageFlags, StateFlags};
pub use control::ControlBlock;
pub use manager::{spawn_stage, StageHandle};
pub use state::WorkerState;
