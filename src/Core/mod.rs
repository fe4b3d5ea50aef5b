pub mod error;
pub mod session;

pub use error::{CallbackError, ChannelError, Hook, Result, StageError};
pub use session::Session;
