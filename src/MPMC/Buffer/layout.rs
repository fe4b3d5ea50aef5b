/// Default number of packet slots in a channel.
pub const DEFAULT_CAPACITY: usize = 64;

/// Default upper bound on the total size (header included) of one packet.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 4 * 1024 * 1024;

/// Lifecycle of one slot.
///
/// `Free -> Writing -> Written -> Reading -> Free`. A reader may claim the
/// position while it is still `Writing`; it then waits for the size commit
/// (`size`) and for the writer's close (`Written`) before touching the bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotPhase {
    Free,
    Writing,
    Written,
    Reading,
}

/// Control-plane entry for a single slot, kept apart from the payload bytes.
#[derive(Copy, Clone, Debug)]
pub struct SlotEntry {
    /// Position this slot currently serves. A free slot holds the next
    /// position a writer may claim in it; it starts at the slot index and
    /// advances by `capacity` every time a reader releases it.
    pub sequence: u64,

    pub phase: SlotPhase,

    /// Committed total packet size, header included.
    pub size: Option<usize>,

    /// Set when the reader closed the packet before the writer did; the
    /// writer then frees the slot on close.
    pub reader_gone: bool,
}

impl SlotEntry {
    pub fn new(index: usize) -> Self {
        Self {
            sequence: index as u64,
            phase: SlotPhase::Free,
            size: None,
            reader_gone: false,
        }
    }
}

/// Cursors and slot table of a channel, guarded by the channel mutex.
#[derive(Debug)]
pub struct RingState {
    /// Next position a reader will claim.
    pub head: u64,

    /// Next position a writer will claim. `tail - head` packets are queued or
    /// in flight.
    pub tail: u64,

    /// One-shot; never cleared once set.
    pub cancelled: bool,

    pub entries: Vec<SlotEntry>,
}

impl RingState {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: 0,
            tail: 0,
            cancelled: false,
            entries: (0..capacity).map(SlotEntry::new).collect(),
        }
    }
}
