use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::callbacks::StageCallbacks;
use super::config::StageConfig;
use crate::Core::error::StageError;
use crate::Core::session::Session;
use crate::MPMC::Channel;

/// State shared by every worker of one stage.
///
/// The shutdown lock guards the live-worker counter, the stop flag and the
/// first error recorded by any worker. The live counter only goes down; the
/// worker that takes it to zero runs the `finish` hook, and nobody else does.
/// `finished` is signalled on `teardown` once that hook has returned.
pub struct ControlBlock<S: StageCallbacks> {
    config: StageConfig,
    callbacks: Arc<S>,
    input: Option<Channel>,
    output: Option<Channel>,
    session: Arc<Session>,
    ordering: Mutex<()>,
    shutdown: Mutex<Shutdown>,
    teardown: Condvar,
}

#[derive(Debug)]
struct Shutdown {
    live: usize,
    stopped: bool,
    error: Option<StageError>,
    finished: bool,
}

impl<S: StageCallbacks> ControlBlock<S> {
    pub(crate) fn new(
        config: StageConfig,
        callbacks: Arc<S>,
        input: Option<Channel>,
        output: Option<Channel>,
        session: Arc<Session>,
    ) -> Self {
        let live = config.threads();
        Self {
            config,
            callbacks,
            input,
            output,
            session,
            ordering: Mutex::new(()),
            shutdown: Mutex::new(Shutdown {
                live,
                stopped: false,
                error: None,
                finished: false,
            }),
            teardown: Condvar::new(),
        }
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn callbacks(&self) -> &S {
        &self.callbacks
    }

    pub fn input(&self) -> Option<&Channel> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&Channel> {
        self.output.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serializes "claim input packet .. claim output packet" across workers.
    pub(crate) fn ordering(&self) -> &Mutex<()> {
        &self.ordering
    }

    pub fn live_workers(&self) -> usize {
        self.shutdown.lock().live
    }

    /// Once set, no worker begins another input read.
    pub fn is_stopped(&self) -> bool {
        self.shutdown.lock().stopped
    }

    /// Whether the `finish` hook has returned.
    pub fn is_finished(&self) -> bool {
        self.shutdown.lock().finished
    }

    /// Block until the `finish` hook has returned. Returns `false` on timeout.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let mut shutdown = self.shutdown.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while !shutdown.finished {
                    if self.teardown.wait_until(&mut shutdown, deadline).timed_out() {
                        return shutdown.finished;
                    }
                }
            }
            None => {
                while !shutdown.finished {
                    self.teardown.wait(&mut shutdown);
                }
            }
        }
        true
    }

    /// Retire the calling worker. `result` is its exit status; interruption
    /// class errors are expected to be mapped to `Ok` already.
    pub(crate) fn retire(&self, result: Result<(), StageError>) {
        let mut shutdown = self.shutdown.lock();
        if self.config.reads_input() && !shutdown.stopped {
            shutdown.stopped = true;
            if let Some(input) = &self.input {
                input.cancel();
            }
        }
        if let Err(err) = result {
            shutdown.error.get_or_insert(err);
        }
        self.release(shutdown, 1);
    }

    /// Retire `count` workers that never started because spawning failed.
    /// Running workers are left alone.
    pub(crate) fn abandon(&self, count: usize, cause: &io::Error) {
        let mut shutdown = self.shutdown.lock();
        shutdown
            .error
            .get_or_insert_with(|| StageError::Resource(io::Error::new(cause.kind(), cause.to_string())));
        self.release(shutdown, count);
    }

    fn release(&self, mut shutdown: MutexGuard<'_, Shutdown>, count: usize) {
        debug_assert!(shutdown.live >= count);
        shutdown.live = shutdown.live.saturating_sub(count);
        if shutdown.live > 0 {
            return;
        }

        let result = match shutdown.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        drop(shutdown);

        debug!(
            "stage {} torn down ({})",
            self.config.name(),
            if result.is_ok() { "clean" } else { "failed" }
        );
        self.callbacks.finish(result);
        self.shutdown.lock().finished = true;
        self.teardown.notify_all();
    }
}
