// This is the bounded packet buffer behind every channel

use super::layout::RingState;

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;

/// Payload storage of a single slot.
///
/// The bytes are reused across laps of the ring, so a steady stream of
/// packets no larger than the first lap's does not allocate.
pub struct Slot {
    pub(crate) data: UnsafeCell<Vec<u8>>,
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self {
            data: UnsafeCell::new(Vec::new()),
        }
    }
}

/// A bounded, multi-producer, multi-consumer buffer of variable-length packets.
///
/// ### Concurrency Design:
/// - **Writers** claim the `tail` position once the slot it maps to has been
///   released by the reader of the previous lap (its `sequence` equals the
///   position). Positions are handed out in claim order, which is the order
///   readers will see them in.
/// - **Readers** claim the `head` position as soon as a writer has claimed it,
///   then wait for the size commit and the writer's close before reading.
/// - The control plane (`RingState`) lives behind one mutex; payload bytes are
///   accessed without it by whichever side the slot phase grants ownership to.
/// - Every state change notifies `changed`; `cancel` wakes every waiter.
pub struct PacketBuffer {
    pub(crate) state: Mutex<RingState>,
    pub(crate) changed: Condvar,

    /// Payload storage, one entry per slot. Padded to keep neighbouring
    /// slots off the same cache line.
    pub(crate) slots: Box<[CachePadded<Slot>]>,

    /// Number of slots. Always a power of two.
    pub(crate) capacity: usize,

    /// `capacity - 1`, used to wrap positions onto slots.
    pub(crate) mask: usize,

    pub(crate) max_packet_size: usize,
}

// Slot bytes are only touched by the side the slot phase currently grants
// ownership to, and phase changes happen under `state`.
unsafe impl Send for PacketBuffer {}
unsafe impl Sync for PacketBuffer {}
