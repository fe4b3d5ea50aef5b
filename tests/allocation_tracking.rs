// Allocation tracking for the packet cycle.
//
// Slots keep their byte storage across laps of the ring, so once every slot
// has carried a packet of a given size, the open/write/close/read cycle must
// not touch the heap. The allocator is process-wide, so the bound allows a
// few blocks from the test harness and lazily initialised runtime state;
// it does not scale with the number of cycles.
//
// Tests using dhat are marked with #[serial_test::serial] because dhat only
// allows one profiler to run at a time.
//
// cargo test --test allocation_tracking -- --nocapture

use dmxp_stage::MPMC::{ChannelBuilder, Packet};
use dmxp_stage::{MessageHeader, MessageType, HEADER_SIZE};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

const CAPACITY: usize = 8;
const PAYLOAD: usize = 256;
const CYCLES: usize = 10_000;
// blocks other threads may allocate while the loop runs
const SLACK: u64 = 64;

fn cycle(writer: &mut Packet, reader: &mut Packet, header: &[u8; HEADER_SIZE], payload: &[u8]) {
    writer.open_write().unwrap();
    writer.set_size(HEADER_SIZE + payload.len()).unwrap();
    writer.write(header).unwrap();
    writer.map_write(payload.len()).unwrap().copy_from_slice(payload);
    writer.close();

    reader.open_read().unwrap();
    let size = reader.size().unwrap();
    let mut got = [0u8; HEADER_SIZE];
    reader.read(&mut got).unwrap();
    let view = reader.map_read(size - HEADER_SIZE).unwrap();
    assert_eq!(view.len(), payload.len());
    assert_eq!(&got, header);
    reader.close();
}

#[test]
#[serial_test::serial]
fn test_steady_state_packet_cycle_with_dhat() {
    println!("\n--- Running packet cycle with dhat ---");
    let _profiler = dhat::Profiler::builder().testing().build();

    let channel = ChannelBuilder::new()
        .with_capacity(CAPACITY)
        .with_max_packet_size(HEADER_SIZE + PAYLOAD)
        .build()
        .unwrap();
    let mut writer = channel.packet();
    let mut reader = channel.packet();
    let header = MessageHeader::new(MessageType::USER, 1).to_bytes();
    let payload = [0x5Au8; PAYLOAD];

    // one full lap so every slot has reserved its bytes
    for _ in 0..CAPACITY * 2 {
        cycle(&mut writer, &mut reader, &header, &payload);
    }

    let before = dhat::HeapStats::get();
    for i in 0..CYCLES {
        // smaller packets reuse the same storage
        let len = PAYLOAD - (i % PAYLOAD);
        cycle(&mut writer, &mut reader, &header, &payload[..len]);
    }
    let after = dhat::HeapStats::get();

    let grown = after.total_blocks - before.total_blocks;
    println!(
        "blocks before: {}, after: {}, grown: {grown}, bytes now: {}",
        before.total_blocks, after.total_blocks, after.curr_bytes
    );
    dhat::assert!(grown <= SLACK, "{grown} allocations over {CYCLES} cycles");
}
