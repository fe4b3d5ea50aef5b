use super::state::WorkerState;
use crate::Core::error::{CallbackError, StageError};

pub type CallbackResult = Result<(), CallbackError>;

/// Hooks a stage runs for every message.
///
/// Every hook is optional. The implementing value is the stage's user
/// context: one instance is shared by all workers of the stage, so any
/// mutation it performs must be synchronized by the implementation. Returning
/// an error from a hook ends the worker; [`CallbackError::Interrupted`] ends
/// it silently.
///
/// Per message the hooks run in this order: `open`, `header` and `read` (when
/// an input packet was read), `write` (when an output packet was opened and the
/// payload is not copied), `close`. `finish` runs once per stage, after the
/// last worker has exited.
pub trait StageCallbacks: Send + Sync + 'static {
    /// Per-worker private data, created with `Default` when the worker spawns.
    type Local: Default + Send + 'static;

    /// Prepares the iteration. Runs before any channel access, so sources use
    /// it to fill in `state.header` and `state.write_size`.
    fn open(&self, _state: &mut WorkerState<Self::Local>) -> CallbackResult {
        Ok(())
    }

    /// Inspects the header just read; may rewrite it and `write_size`.
    fn header(&self, _state: &mut WorkerState<Self::Local>) -> CallbackResult {
        Ok(())
    }

    /// Consumes the input payload in place.
    fn read(&self, _state: &mut WorkerState<Self::Local>, _input: &[u8]) -> CallbackResult {
        Ok(())
    }

    /// Produces the output payload in place. `output` is `write_size` bytes
    /// long; lower `state.write_size` to publish fewer bytes. `input` is empty
    /// when no input packet was read.
    fn write(
        &self,
        _state: &mut WorkerState<Self::Local>,
        _input: &[u8],
        _output: &mut [u8],
    ) -> CallbackResult {
        Ok(())
    }

    /// Runs at the end of every iteration, whatever was skipped.
    fn close(&self, _state: &mut WorkerState<Self::Local>) -> CallbackResult {
        Ok(())
    }

    /// Runs exactly once, on the last worker to exit. `result` is `Ok` for a
    /// clean shutdown (end of stream or cancellation) and otherwise carries the
    /// first error any worker hit.
    fn finish(&self, _result: Result<(), StageError>) {}
}
