// In demos/pipeline.rs
//
// A four-stage pipeline: a capture stage generates synthetic frames, a
// multi-worker compress stage run-length encodes them (the encoded size is
// only known after encoding), a mux stage renumbers streams and forwards
// payloads untouched, and a write stage sums what reaches the end.
//
// Press Ctrl+C to cancel the whole pipeline early.
//
// cargo run --example pipeline -- 2000 [--threads 4]
use dmxp_stage::{
    spawn_stage, CallbackResult, ChannelBuilder, MessageHeader, MessageType, Session, StageBuilder,
    StageCallbacks, StageError, StageFlags, WorkerState,
};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME_SIZE: usize = 4096;
const VIDEO: MessageType = MessageType(0x100);

fn report(stage: &str, result: Result<(), StageError>) {
    match result {
        Ok(()) => println!("[{stage}] finished"),
        Err(e) => eprintln!("[{stage}] failed: {e}"),
    }
}

/// Generates `frames` frames, then the end-of-stream sentinel.
struct Capture {
    frames: u32,
}

impl StageCallbacks for Capture {
    type Local = u32;

    fn open(&self, state: &mut WorkerState<u32>) -> CallbackResult {
        if state.local < self.frames {
            state.header = MessageHeader::new(VIDEO, state.local);
            state.write_size = FRAME_SIZE;
        } else {
            state.header = MessageHeader::close();
            state.write_size = 0;
        }
        state.local += 1;
        Ok(())
    }

    fn write(&self, state: &mut WorkerState<u32>, _input: &[u8], output: &mut [u8]) -> CallbackResult {
        // long runs of one value so the encoder has something to do
        let seed = state.header.stream_id as usize;
        for (i, byte) in output.iter_mut().enumerate() {
            *byte = ((i / 64 + seed) % 251) as u8;
        }
        Ok(())
    }

    fn finish(&self, result: Result<(), StageError>) {
        report("capture", result);
    }
}

/// Run-length encodes each frame as (count, value) pairs.
struct Compress;

impl StageCallbacks for Compress {
    type Local = ();

    fn header(&self, state: &mut WorkerState<()>) -> CallbackResult {
        // worst case doubles the frame
        state.write_size = state.read_size * 2;
        Ok(())
    }

    fn write(&self, state: &mut WorkerState<()>, input: &[u8], output: &mut [u8]) -> CallbackResult {
        let mut written = 0;
        let mut rest = input;
        while let Some(&value) = rest.first() {
            let run = rest.iter().take(255).take_while(|&&b| b == value).count();
            output[written] = run as u8;
            output[written + 1] = value;
            written += 2;
            rest = &rest[run..];
        }
        state.write_size = written;
        Ok(())
    }

    fn finish(&self, result: Result<(), StageError>) {
        report("compress", result);
    }
}

/// Moves every stream to the muxed id range; payloads are copied as is.
struct Mux;

impl StageCallbacks for Mux {
    type Local = ();

    fn header(&self, state: &mut WorkerState<()>) -> CallbackResult {
        if !state.header.message_type.is_close() {
            state.header.stream_id |= 0x8000_0000;
        }
        Ok(())
    }

    fn finish(&self, result: Result<(), StageError>) {
        report("mux", result);
    }
}

#[derive(Default)]
struct Sink {
    packets: AtomicU64,
    bytes: AtomicU64,
}

impl StageCallbacks for Sink {
    type Local = ();

    fn read(&self, state: &mut WorkerState<()>, input: &[u8]) -> CallbackResult {
        if !state.header.message_type.is_close() {
            self.packets.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(input.len() as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    fn finish(&self, result: Result<(), StageError>) {
        report("write", result);
    }
}

fn main() -> Result<(), StageError> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let frames: u32 = args
        .get(1)
        .map(|n| n.parse().expect("Invalid number of frames"))
        .unwrap_or(2000);
    let threads: usize = args
        .iter()
        .position(|a| a == "--threads")
        .and_then(|i| args.get(i + 1))
        .map(|n| n.parse().expect("Invalid thread count"))
        .unwrap_or(4);

    let session = Session::new();
    session.cancel_on_interrupt()?;

    let raw = ChannelBuilder::new().with_capacity(16).with_channel_id(0).build()?;
    let encoded = ChannelBuilder::new().with_capacity(16).with_channel_id(1).build()?;
    let muxed = ChannelBuilder::new().with_capacity(16).with_channel_id(2).build()?;

    let start = Instant::now();
    let sink = Arc::new(Sink::default());

    let write = spawn_stage(
        &session,
        StageBuilder::new("write").flags(StageFlags::READS_INPUT).build(),
        Arc::clone(&sink),
        Some(muxed.clone()),
        None,
    )?;
    let mux = spawn_stage(
        &session,
        StageBuilder::new("mux")
            .flags(StageFlags::READS_INPUT | StageFlags::WRITES_OUTPUT | StageFlags::COPY_PAYLOAD)
            .build(),
        Arc::new(Mux),
        Some(encoded.clone()),
        Some(muxed),
    )?;
    let compress = spawn_stage(
        &session,
        StageBuilder::new("compress")
            .threads(threads)
            .flags(
                StageFlags::READS_INPUT
                    | StageFlags::WRITES_OUTPUT
                    | StageFlags::FINAL_SIZE_UNKNOWN_AT_WRITE_START,
            )
            .build(),
        Arc::new(Compress),
        Some(raw.clone()),
        Some(encoded),
    )?;
    let capture = spawn_stage(
        &session,
        StageBuilder::new("capture").flags(StageFlags::WRITES_OUTPUT).build(),
        Arc::new(Capture { frames }),
        None,
        Some(raw),
    )?;

    println!("Pipeline: capturing {frames} frames with {threads} compress worker(s)...");
    while !write.is_finished() {
        std::thread::sleep(Duration::from_millis(100));
        println!(
            "  written {} packets (compress workers alive: {})",
            sink.packets.load(Ordering::Relaxed),
            compress.live_workers()
        );
    }

    for (name, done) in [
        (capture.name(), capture.wait_finished(Duration::from_secs(1))),
        (compress.name(), compress.wait_finished(Duration::from_secs(1))),
        (mux.name(), mux.wait_finished(Duration::from_secs(1))),
    ] {
        if !done {
            eprintln!("[{name}] still running");
        }
    }
    let elapsed = start.elapsed();
    let packets = sink.packets.load(Ordering::Relaxed);
    let bytes = sink.bytes.load(Ordering::Relaxed);
    println!("Pipeline: wrote {packets} packets ({bytes} bytes) in {elapsed:.2?}");
    println!(
        "Pipeline: compression ratio {:.2}",
        (packets as f64 * FRAME_SIZE as f64) / bytes.max(1) as f64
    );
    Ok(())
}
