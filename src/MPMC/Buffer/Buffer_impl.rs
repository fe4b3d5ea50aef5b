use std::time::Instant;

use log::warn;
use parking_lot::MutexGuard;

use super::layout::{RingState, SlotPhase};
use super::Buffer::{PacketBuffer, Slot};
use crate::Core::error::ChannelError;
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};

impl PacketBuffer {
    /// Create a buffer with `capacity` slots.
    ///
    /// `capacity` must be a non-zero power of two; `ChannelBuilder` checks this.
    pub(crate) fn new(capacity: usize, max_packet_size: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        Self {
            state: Mutex::new(RingState::new(capacity)),
            changed: Condvar::new(),
            slots: (0..capacity).map(|_| CachePadded::new(Slot::new())).collect(),
            capacity,
            mask: capacity - 1,
            max_packet_size,
        }
    }

    #[inline]
    fn index(&self, position: u64) -> usize {
        (position as usize) & self.mask
    }

    /// Raw access to the payload bytes of the slot serving `position`.
    ///
    /// # Safety
    /// The caller must own the slot: the writer between `claim_write` and
    /// `finish_write`, or the reader between `await_written` and `finish_read`.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_data(&self, position: u64) -> &mut Vec<u8> {
        &mut *self.slots[self.index(position)].data.get()
    }

    /// Block on `changed`. Returns `true` if `deadline` passed.
    fn wait(&self, guard: &mut MutexGuard<'_, RingState>, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => self.changed.wait_until(guard, deadline).timed_out(),
            None => {
                self.changed.wait(guard);
                false
            }
        }
    }

    /// Claim the next write position, blocking while the ring is full.
    pub(crate) fn claim_write(&self) -> Result<u64, ChannelError> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Err(ChannelError::Cancelled);
            }

            let position = state.tail;
            let idx = self.index(position);
            let entry = &mut state.entries[idx];
            if entry.phase == SlotPhase::Free && entry.sequence == position {
                entry.phase = SlotPhase::Writing;
                entry.size = None;
                entry.reader_gone = false;
                state.tail += 1;
                // readers blocked on an empty ring may claim it now
                self.changed.notify_all();
                return Ok(position);
            }

            // full: the previous lap's reader still owns the slot
            self.wait(&mut state, None);
        }
    }

    /// Claim the next read position, blocking while the ring is empty.
    /// Returns `Ok(None)` if `deadline` passes first.
    pub(crate) fn claim_read(&self, deadline: Option<Instant>) -> Result<Option<u64>, ChannelError> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Err(ChannelError::Cancelled);
            }

            if state.head < state.tail {
                let position = state.head;
                state.head += 1;
                return Ok(Some(position));
            }

            if self.wait(&mut state, deadline) {
                return Ok(None);
            }
        }
    }

    /// Publish the final size of the packet at `position`.
    pub(crate) fn commit_size(&self, position: u64, total: usize) -> Result<(), ChannelError> {
        if total > self.max_packet_size {
            return Err(ChannelError::PacketTooLarge {
                requested: total,
                max: self.max_packet_size,
            });
        }

        let mut state = self.state.lock();
        let idx = self.index(position);
        let entry = &mut state.entries[idx];
        if entry.size.is_some() {
            return Err(ChannelError::SizeAlreadyCommitted);
        }
        entry.size = Some(total);
        self.changed.notify_all();
        Ok(())
    }

    /// Wait until the writer of `position` has committed its size.
    pub(crate) fn committed_size(&self, position: u64) -> Result<usize, ChannelError> {
        let mut state = self.state.lock();
        let idx = self.index(position);
        loop {
            if let Some(size) = state.entries[idx].size {
                return Ok(size);
            }
            if state.cancelled {
                return Err(ChannelError::Cancelled);
            }
            self.wait(&mut state, None);
        }
    }

    /// Wait until the writer of `position` has closed its packet and hand the
    /// bytes over to the reader.
    pub(crate) fn await_written(&self, position: u64) -> Result<usize, ChannelError> {
        let mut state = self.state.lock();
        let idx = self.index(position);
        loop {
            let entry = &mut state.entries[idx];
            match entry.phase {
                SlotPhase::Written | SlotPhase::Reading => {
                    entry.phase = SlotPhase::Reading;
                    // a written packet always has a committed size
                    return Ok(entry.size.unwrap_or(0));
                }
                _ => {}
            }
            if state.cancelled {
                return Err(ChannelError::Cancelled);
            }
            self.wait(&mut state, None);
        }
    }

    /// Close the write side of `position`. `written` is the number of bytes
    /// the writer actually produced; it becomes the size if none was committed.
    pub(crate) fn finish_write(&self, position: u64, written: usize) -> usize {
        let mut state = self.state.lock();
        let idx = self.index(position);

        let size = match state.entries[idx].size {
            Some(size) => size,
            None => {
                warn!(
                    "packet {position} closed without a committed size, using {written} written bytes"
                );
                state.entries[idx].size = Some(written);
                written
            }
        };

        // Safety: the slot is still in the Writing phase, owned by this writer.
        unsafe { self.slot_data(position) }.resize(size, 0);

        let capacity = self.capacity as u64;
        let entry = &mut state.entries[idx];
        if entry.reader_gone {
            entry.sequence = position + capacity;
            entry.phase = SlotPhase::Free;
            entry.size = None;
            entry.reader_gone = false;
        } else {
            entry.phase = SlotPhase::Written;
        }
        self.changed.notify_all();
        size
    }

    /// Close the read side of `position` and release the slot to the next lap.
    pub(crate) fn finish_read(&self, position: u64) {
        let mut state = self.state.lock();
        let idx = self.index(position);
        let capacity = self.capacity as u64;
        let entry = &mut state.entries[idx];
        match entry.phase {
            SlotPhase::Written | SlotPhase::Reading => {
                entry.sequence = position + capacity;
                entry.phase = SlotPhase::Free;
                entry.size = None;
            }
            // the writer is still producing; it releases the slot on close
            SlotPhase::Writing => entry.reader_gone = true,
            SlotPhase::Free => {}
        }
        self.changed.notify_all();
    }

    /// Cancel the buffer and wake every blocked caller.
    pub(crate) fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.changed.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Packets claimed by writers but not yet claimed by readers.
    pub(crate) fn len(&self) -> usize {
        let state = self.state.lock();
        (state.tail - state.head) as usize
    }
}
