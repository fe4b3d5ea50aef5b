use std::sync::Arc;

use log::{debug, error};

use super::callbacks::StageCallbacks;
use super::config::StateFlags;
use super::control::ControlBlock;
use super::state::WorkerState;
use crate::Core::error::{ChannelError, Hook, StageError};
use crate::MPMC::Packet;
use crate::MPMC::Structs::{MessageHeader, HEADER_SIZE};

/// Body of one worker thread. Returns once the worker has retired.
pub(crate) fn run<S: StageCallbacks>(ctl: Arc<ControlBlock<S>>, mut state: WorkerState<S::Local>) {
    let config = ctl.config();
    debug!("{}:{} started", state.stage(), state.worker());

    let mut input = ctl
        .input()
        .filter(|_| config.reads_input())
        .map(|channel| channel.packet());
    let mut output = ctl
        .output()
        .filter(|_| config.writes_output())
        .map(|channel| channel.packet());

    let result = process(&ctl, &mut state, input.as_mut(), output.as_mut());

    // any packet left open by a failed iteration is closed here
    if let Some(packet) = input.take() {
        packet.destroy();
    }
    if let Some(packet) = output.take() {
        packet.destroy();
    }

    let result = match result {
        Ok(()) => {
            debug!("{}:{} exiting", state.stage(), state.worker());
            Ok(())
        }
        Err(err) if err.is_interrupted() => {
            debug!("{}:{} interrupted: {err}", state.stage(), state.worker());
            Ok(())
        }
        Err(err) => {
            error!("{}:{} failed: {err}", state.stage(), state.worker());
            Err(err)
        }
    };
    ctl.retire(result);
}

fn process<S: StageCallbacks>(
    ctl: &ControlBlock<S>,
    state: &mut WorkerState<S::Local>,
    mut input: Option<&mut Packet>,
    mut output: Option<&mut Packet>,
) -> Result<(), StageError> {
    let callbacks = ctl.callbacks();
    let config = ctl.config();

    loop {
        callbacks.open(state).map_err(StageError::callback(Hook::Open))?;

        let mut order = config.preserves_order().then(|| ctl.ordering().lock());

        let mut reader = input
            .as_deref_mut()
            .filter(|_| !state.flags.contains(StateFlags::SKIP_READ));
        let payload: &[u8] = match reader.as_deref_mut() {
            Some(packet) => {
                if ctl.is_stopped() {
                    return Ok(());
                }
                packet.open_read()?;

                let size = packet.size()?;
                if size < HEADER_SIZE {
                    return Err(ChannelError::Truncated {
                        size,
                        header: HEADER_SIZE,
                    }
                    .into());
                }
                let mut header = [0u8; HEADER_SIZE];
                packet.read(&mut header)?;
                state.header = MessageHeader::from_bytes(&header);
                state.read_size = size - HEADER_SIZE;
                state.write_size = state.read_size;

                callbacks
                    .header(state)
                    .map_err(StageError::callback(Hook::Header))?;

                let view = packet.map_read(state.read_size)?;
                callbacks
                    .read(state, view)
                    .map_err(StageError::callback(Hook::Read))?;
                view
            }
            None => &[],
        };

        let mut writer = output
            .as_deref_mut()
            .filter(|_| !state.flags.contains(StateFlags::SKIP_WRITE));
        let mut sized = false;
        if let Some(packet) = writer.as_deref_mut() {
            packet.open_write()?;
            // output position is claimed, the next worker may read
            drop(order.take());

            packet.write(&state.header.to_bytes())?;
            if !state.flags.contains(StateFlags::UNKNOWN_FINAL_SIZE) {
                packet.set_size(HEADER_SIZE + state.write_size)?;
                sized = true;
            }

            if state.flags.contains(StateFlags::COPY) {
                let copied = payload
                    .get(..state.write_size)
                    .ok_or(ChannelError::OutOfBounds {
                        offset: 0,
                        len: state.write_size,
                        size: payload.len(),
                    })?;
                packet.write(copied)?;
            } else {
                let reserved = state.write_size;
                let view = packet.map_write(reserved)?;
                callbacks
                    .write(state, payload, view)
                    .map_err(StageError::callback(Hook::Write))?;
                if state.write_size > reserved {
                    return Err(ChannelError::OutOfBounds {
                        offset: HEADER_SIZE,
                        len: state.write_size,
                        size: HEADER_SIZE + reserved,
                    }
                    .into());
                }
            }
        }

        drop(order.take());

        if let Some(packet) = reader {
            packet.close();
        }
        state.read_size = 0;

        if let Some(packet) = writer {
            if !sized {
                packet.set_size(HEADER_SIZE + state.write_size)?;
            }
            packet.close();
        }
        state.write_size = 0;

        callbacks
            .close(state)
            .map_err(StageError::callback(Hook::Close))?;
        state.flags = config.initial_state_flags();

        if ctl.session().is_cancelled() || state.header.message_type.is_close() || ctl.is_stopped() {
            return Ok(());
        }
    }
}
