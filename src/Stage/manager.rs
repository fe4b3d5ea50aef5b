use std::fmt;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, error};

use super::callbacks::StageCallbacks;
use super::config::StageConfig;
use super::control::ControlBlock;
use super::state::WorkerState;
use super::worker;
use crate::Core::error::StageError;
use crate::Core::session::Session;
use crate::MPMC::Channel;

/// Start a stage: `config.threads()` detached worker threads sharing one
/// control block.
///
/// A channel must be supplied for every capability in `config.flags()`;
/// supplied channels are registered with `session` so that cancelling the
/// session wakes workers blocked in them. If a thread fails to spawn, the error
/// is returned while the workers already running carry on; the missing
/// workers are retired so that `finish` still runs exactly once.
pub fn spawn_stage<S: StageCallbacks>(
    session: &Arc<Session>,
    config: StageConfig,
    callbacks: Arc<S>,
    input: Option<Channel>,
    output: Option<Channel>,
) -> Result<StageHandle<S>, StageError> {
    validate(&config, input.as_ref(), output.as_ref())?;

    for channel in input.iter().chain(output.iter()) {
        session.register(channel);
    }

    let threads = config.threads();
    let name = config.shared_name();
    let flags = config.initial_state_flags();
    let ctl = Arc::new(ControlBlock::new(
        config,
        callbacks,
        input,
        output,
        Arc::clone(session),
    ));
    let handle = StageHandle {
        name: Arc::clone(&name),
        control: Arc::downgrade(&ctl),
    };

    for index in 0..threads {
        let state = WorkerState::new(index, Arc::clone(&name), flags);
        let worker_ctl = Arc::clone(&ctl);
        let spawned = thread::Builder::new()
            .name(format!("{name}:{index}"))
            .spawn(move || worker::run(worker_ctl, state));

        if let Err(err) = spawned {
            error!("stage {name}: failed to spawn worker {index} of {threads}: {err}");
            ctl.abandon(threads - index, &err);
            return Err(StageError::Resource(err));
        }
    }

    debug!("stage {name} running with {threads} worker(s)");
    Ok(handle)
}

fn validate(
    config: &StageConfig,
    input: Option<&Channel>,
    output: Option<&Channel>,
) -> Result<(), StageError> {
    if config.threads() == 0 {
        return Err(StageError::Configuration(format!(
            "stage {} needs at least one thread",
            config.name()
        )));
    }
    if config.reads_input() && input.is_none() {
        return Err(StageError::Configuration(format!(
            "stage {} reads input but has no input channel",
            config.name()
        )));
    }
    if config.writes_output() && output.is_none() {
        return Err(StageError::Configuration(format!(
            "stage {} writes output but has no output channel",
            config.name()
        )));
    }
    Ok(())
}

/// Observer for a running stage.
///
/// The handle holds no strong reference: once the last worker has retired the
/// control block is gone and the handle reports the stage as finished.
pub struct StageHandle<S: StageCallbacks> {
    name: Arc<str>,
    control: Weak<ControlBlock<S>>,
}

impl<S: StageCallbacks> StageHandle<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn live_workers(&self) -> usize {
        self.control.upgrade().map_or(0, |ctl| ctl.live_workers())
    }

    pub fn is_stopped(&self) -> bool {
        self.control.upgrade().map_or(true, |ctl| ctl.is_stopped())
    }

    pub fn is_finished(&self) -> bool {
        self.control.upgrade().map_or(true, |ctl| ctl.is_finished())
    }

    /// Block until the stage has finished. Returns `false` on timeout.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        self.control
            .upgrade()
            .map_or(true, |ctl| ctl.wait_finished(timeout))
    }
}

impl<S: StageCallbacks> Clone for StageHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            control: Weak::clone(&self.control),
        }
    }
}

impl<S: StageCallbacks> fmt::Debug for StageHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageHandle")
            .field("name", &self.name)
            .field("live_workers", &self.live_workers())
            .field("finished", &self.is_finished())
            .finish()
    }
}
