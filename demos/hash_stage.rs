// In demos/hash_stage.rs
//
// A four-worker stage that replaces every message with the SHA-256 of its
// payload. Hashes come out in the order the messages went in.
//
// cargo run --example hash_stage -- 1000
use dmxp_stage::{
    spawn_stage, CallbackResult, ChannelBuilder, MessageHeader, MessageType, Session, StageBuilder,
    StageCallbacks, StageError, StageFlags, WorkerState,
};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DIGEST_SIZE: usize = 32;

struct HashStage;

impl StageCallbacks for HashStage {
    // messages hashed by this worker
    type Local = u64;

    fn header(&self, state: &mut WorkerState<u64>) -> CallbackResult {
        if !state.header.message_type.is_close() {
            state.write_size = DIGEST_SIZE;
        }
        Ok(())
    }

    fn write(&self, state: &mut WorkerState<u64>, input: &[u8], output: &mut [u8]) -> CallbackResult {
        if state.header.message_type.is_close() {
            return Ok(());
        }
        output.copy_from_slice(&Sha256::digest(input));
        state.local += 1;
        Ok(())
    }

    fn close(&self, state: &mut WorkerState<u64>) -> CallbackResult {
        if state.header.message_type.is_close() {
            println!("hash worker {} done after {} message(s)", state.worker(), state.local);
        }
        Ok(())
    }

    fn finish(&self, result: Result<(), StageError>) {
        match result {
            Ok(()) => println!("hash stage finished"),
            Err(e) => eprintln!("hash stage failed: {e}"),
        }
    }
}

fn main() -> Result<(), StageError> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let num_messages: u32 = args
        .get(1)
        .map(|n| n.parse().expect("Invalid number of messages"))
        .unwrap_or(1000);

    let session = Session::new();
    session.cancel_on_interrupt()?;

    let input = ChannelBuilder::new().with_capacity(32).with_channel_id(0).build()?;
    let output = ChannelBuilder::new().with_capacity(32).with_channel_id(1).build()?;

    let config = StageBuilder::new("sha256")
        .threads(4)
        .flags(StageFlags::READS_INPUT | StageFlags::WRITES_OUTPUT)
        .build();
    let handle = spawn_stage(&session, config, Arc::new(HashStage), Some(input.clone()), Some(output.clone()))?;

    let mut producer = input.producer();
    let feeder = std::thread::spawn(move || {
        for i in 0..num_messages {
            let message = format!("message_{i}");
            if producer.send(MessageHeader::new(MessageType::USER, i), message).is_err() {
                return;
            }
        }
        let _ = producer.send_close();
    });

    let start = Instant::now();
    let mut consumer = output.consumer();
    let mut received = 0u32;
    while let Ok((header, digest)) = consumer.receive() {
        if header.message_type.is_close() {
            break;
        }
        assert_eq!(header.stream_id, received, "hash arrived out of order");
        if received % 100 == 0 {
            let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
            println!("message_{} => {}", header.stream_id, hex);
        }
        received += 1;
    }
    let elapsed = start.elapsed();

    feeder.join().expect("feeder thread panicked");
    handle.wait_finished(Duration::from_secs(5));

    println!("Hashed {received} messages in {elapsed:.2?}");
    println!(
        "Throughput: {:.2} messages/sec",
        received as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
