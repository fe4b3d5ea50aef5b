use std::sync::Arc;

bitflags::bitflags! {
    /// Capabilities of a stage, fixed when the stage starts.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        /// Workers read packets from the input channel.
        const READS_INPUT = 1 << 0;
        /// Workers write packets to the output channel.
        const WRITES_OUTPUT = 1 << 1;
        /// Copy the read payload into the output packet instead of running the
        /// write hook.
        const COPY_PAYLOAD = 1 << 2;
        /// The output size is only known once the write hook has run.
        const FINAL_SIZE_UNKNOWN_AT_WRITE_START = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Per-message flags, settable by hooks for the current iteration.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        /// Do not open an input packet this iteration.
        const SKIP_READ = 1 << 0;
        /// Do not open an output packet this iteration.
        const SKIP_WRITE = 1 << 1;
        /// Commit the output size after the write hook instead of before it.
        const UNKNOWN_FINAL_SIZE = 1 << 2;
        /// Copy the read payload instead of running the write hook.
        const COPY = 1 << 3;
    }
}

/// Immutable description of a stage.
#[derive(Clone, Debug)]
pub struct StageConfig {
    name: Arc<str>,
    threads: usize,
    flags: StageFlags,
}

impl StageConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn flags(&self) -> StageFlags {
        self.flags
    }

    pub fn reads_input(&self) -> bool {
        self.flags.contains(StageFlags::READS_INPUT)
    }

    pub fn writes_output(&self) -> bool {
        self.flags.contains(StageFlags::WRITES_OUTPUT)
    }

    /// Whether claim order has to be serialized across workers.
    pub fn preserves_order(&self) -> bool {
        self.reads_input() && self.writes_output()
    }

    /// Per-message flags every iteration starts from.
    pub fn initial_state_flags(&self) -> StateFlags {
        let mut flags = StateFlags::empty();
        flags.set(StateFlags::COPY, self.flags.contains(StageFlags::COPY_PAYLOAD));
        flags.set(
            StateFlags::UNKNOWN_FINAL_SIZE,
            self.flags.contains(StageFlags::FINAL_SIZE_UNKNOWN_AT_WRITE_START),
        );
        flags
    }
}

pub struct StageBuilder {
    name: String,
    threads: usize,
    flags: StageFlags,
}

impl StageBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            threads: 1,
            flags: StageFlags::empty(),
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn flags(mut self, flags: StageFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Shorthand for a stage that reads input and writes output.
    pub fn transform(mut self) -> Self {
        self.flags |= StageFlags::READS_INPUT | StageFlags::WRITES_OUTPUT;
        self
    }

    pub fn build(self) -> StageConfig {
        StageConfig {
            name: self.name.into(),
            threads: self.threads,
            flags: self.flags,
        }
    }
}
