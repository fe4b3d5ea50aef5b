use std::fmt;
use std::io;

use thiserror::Error;

pub type Result<T, E = StageError> = std::result::Result<T, E>;

/// Errors raised by a packet channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel was cancelled, either while the caller was blocked or before
    /// the call was made.
    #[error("channel cancelled")]
    Cancelled,

    #[error("packet too large ({requested} > {max} bytes)")]
    PacketTooLarge { requested: usize, max: usize },

    #[error("packet is not open")]
    NotOpen,

    #[error("packet is already open")]
    AlreadyOpen,

    #[error("operation not valid on a packet opened for {0}")]
    WrongMode(&'static str),

    #[error("access past end of packet (offset {offset} + {len} > {size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("packet of {size} bytes is shorter than its header ({header} bytes)")]
    Truncated { size: usize, header: usize },

    #[error("packet size already committed")]
    SizeAlreadyCommitted,
}

/// Failure returned by a stage hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("{0}")]
    Failed(String),

    /// Requests a silent, clean shutdown of the worker.
    #[error("interrupted")]
    Interrupted,
}

impl CallbackError {
    pub fn failed(reason: impl Into<String>) -> Self {
        CallbackError::Failed(reason.into())
    }
}

/// Identifies which stage hook produced a [`CallbackError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Open,
    Header,
    Read,
    Write,
    Close,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Open => "open",
            Hook::Header => "header",
            Hook::Read => "read",
            Hook::Write => "write",
            Hook::Close => "close",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid stage configuration: {0}")]
    Configuration(String),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("{hook} callback failed: {source}")]
    Callback {
        hook: Hook,
        #[source]
        source: CallbackError,
    },

    #[error("resource error: {0}")]
    Resource(#[from] io::Error),

    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

impl StageError {
    pub(crate) fn callback(hook: Hook) -> impl FnOnce(CallbackError) -> StageError {
        move |source| StageError::Callback { hook, source }
    }

    /// Interruption-class errors end a worker silently and are not reported
    /// to the finish hook.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            StageError::Channel(ChannelError::Cancelled)
                | StageError::Callback {
                    source: CallbackError::Interrupted,
                    ..
                }
        ) || matches!(self, StageError::Resource(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}
