// Channel behaviour: ordering, exactly-once delivery, size commits,
// cancellation and packet-context errors.
//
// cargo test --test channel -- --nocapture

use dmxp_stage::MPMC::{Channel, ChannelBuilder, PacketMode};
use dmxp_stage::{ChannelError, MessageHeader, MessageType, Session, StageError, HEADER_SIZE};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn channel(capacity: usize) -> Channel {
    ChannelBuilder::new()
        .with_capacity(capacity)
        .with_max_packet_size(1024)
        .build()
        .unwrap()
}

fn user(stream_id: u32) -> MessageHeader {
    MessageHeader::new(MessageType::USER, stream_id)
}

#[test]
fn builder_rejects_bad_geometry() {
    let err = ChannelBuilder::new().with_capacity(6).build().unwrap_err();
    assert!(matches!(err, StageError::Configuration(_)), "{err}");

    let err = ChannelBuilder::new().with_capacity(0).build().unwrap_err();
    assert!(matches!(err, StageError::Configuration(_)), "{err}");

    let err = ChannelBuilder::new()
        .with_max_packet_size(HEADER_SIZE - 1)
        .build()
        .unwrap_err();
    assert!(matches!(err, StageError::Configuration(_)), "{err}");

    let ch = ChannelBuilder::new().with_channel_id(3).with_capacity(16).build().unwrap();
    assert_eq!(ch.channel_id(), 3);
    assert_eq!(ch.capacity(), 16);
    assert!(ch.is_empty());
}

#[test]
fn messages_arrive_in_send_order() {
    let ch = channel(8);
    let mut producer = ch.producer();
    let mut consumer = ch.consumer();

    let sender = thread::spawn(move || {
        for i in 0..200u32 {
            producer.send(user(i), i.to_le_bytes()).unwrap();
        }
        producer.send_close().unwrap();
        producer.sent()
    });

    let mut next = 0u32;
    loop {
        let (header, payload) = consumer.receive().unwrap();
        if header.message_type.is_close() {
            assert!(payload.is_empty());
            break;
        }
        assert_eq!(header.stream_id, next);
        assert_eq!(payload, next.to_le_bytes());
        next += 1;
    }

    assert_eq!(next, 200);
    assert_eq!(sender.join().unwrap(), 201);
    assert_eq!(consumer.received(), 201);
}

#[test]
fn every_packet_is_claimed_exactly_once() {
    let ch = channel(16);
    let producers = 4;
    let consumers = 4;
    let per_producer = 250u32;

    let mut senders = Vec::new();
    for p in 0..producers {
        let mut producer = ch.producer();
        senders.push(thread::spawn(move || {
            for i in 0..per_producer {
                let id = p * per_producer + i;
                producer.send(user(id), id.to_le_bytes()).unwrap();
            }
        }));
    }

    let mut receivers = Vec::new();
    for _ in 0..consumers {
        let mut consumer = ch.consumer();
        receivers.push(thread::spawn(move || {
            let mut seen = Vec::new();
            loop {
                let (header, payload) = consumer.receive().unwrap();
                if header.message_type.is_close() {
                    return seen;
                }
                let id = u32::from_le_bytes(payload.try_into().unwrap());
                assert_eq!(id, header.stream_id);
                seen.push(id);
            }
        }));
    }

    for sender in senders {
        sender.join().unwrap();
    }
    let mut closer = ch.producer();
    for _ in 0..consumers {
        closer.send_close().unwrap();
    }

    let mut all = HashSet::new();
    let mut total = 0;
    for receiver in receivers {
        for id in receiver.join().unwrap() {
            assert!(all.insert(id), "message {id} delivered twice");
            total += 1;
        }
    }
    assert_eq!(total, producers * per_producer);
    assert_eq!(all.len() as u32, producers * per_producer);
}

#[test]
fn cancel_wakes_blocked_readers_and_writers() {
    let empty = channel(2);
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let mut consumer = empty.consumer();
            thread::spawn(move || consumer.receive().map(|_| ()))
        })
        .collect();

    let full = channel(2);
    let mut filler = full.producer();
    filler.send(user(0), [1u8]).unwrap();
    filler.send(user(1), [2u8]).unwrap();
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let mut producer = full.producer();
            thread::spawn(move || producer.send(user(10 + i), [0u8; 4]))
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    empty.cancel();
    full.cancel();
    // idempotent
    full.cancel();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), Err(ChannelError::Cancelled));
    }
    for writer in writers {
        assert_eq!(writer.join().unwrap(), Err(ChannelError::Cancelled));
    }
    assert!(empty.is_cancelled());
    assert_eq!(empty.packet().open_write(), Err(ChannelError::Cancelled));
}

#[test]
fn receive_timeout_returns_none_on_empty_channel() {
    let ch = channel(4);
    let mut consumer = ch.consumer();
    let got = consumer.receive_timeout(Duration::from_millis(20)).unwrap();
    assert!(got.is_none());

    ch.producer().send(user(5), b"abc").unwrap();
    let (header, payload) = consumer
        .receive_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(header, user(5));
    assert_eq!(payload, b"abc");
}

#[test]
fn reader_never_sees_an_uncommitted_size() {
    let ch = channel(4);
    let mut writer = ch.packet();
    writer.open_write().unwrap();

    let committed = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&committed);
    let mut reader = ch.packet();
    let handle = thread::spawn(move || {
        reader.open_read().unwrap();
        let size = reader.size().unwrap();
        assert!(seen.load(Ordering::SeqCst), "size visible before commit");
        let mut header = [0u8; HEADER_SIZE];
        reader.read(&mut header).unwrap();
        let payload = reader.map_read(size - HEADER_SIZE).unwrap().to_vec();
        reader.close();
        (size, MessageHeader::from_bytes(&header), payload)
    });

    writer.write(&user(9).to_bytes()).unwrap();
    writer.write(b"payload").unwrap();
    thread::sleep(Duration::from_millis(30));
    committed.store(true, Ordering::SeqCst);
    writer.set_size(HEADER_SIZE + 7).unwrap();
    assert_eq!(writer.set_size(HEADER_SIZE + 7), Err(ChannelError::SizeAlreadyCommitted));
    writer.close();

    let (size, header, payload) = handle.join().unwrap();
    assert_eq!(size, HEADER_SIZE + 7);
    assert_eq!(header, user(9));
    assert_eq!(payload, b"payload");
}

#[test]
fn close_without_size_publishes_written_bytes() {
    let ch = channel(4);
    let mut writer = ch.packet();
    writer.open_write().unwrap();
    writer.write(&user(1).to_bytes()).unwrap();
    writer.map_write(5).unwrap().copy_from_slice(b"hello");
    assert_eq!(writer.size().unwrap(), HEADER_SIZE + 5);
    writer.close();

    let (header, payload) = ch.consumer().receive().unwrap();
    assert_eq!(header, user(1));
    assert_eq!(payload, b"hello");
}

#[test]
fn oversized_packets_are_rejected() {
    let ch = channel(4);
    let mut writer = ch.packet();
    writer.open_write().unwrap();
    assert_eq!(
        writer.set_size(1025),
        Err(ChannelError::PacketTooLarge {
            requested: 1025,
            max: 1024
        })
    );
    assert!(matches!(
        writer.map_write(2000),
        Err(ChannelError::PacketTooLarge { .. })
    ));
    writer.set_size(HEADER_SIZE).unwrap();
    writer.write(&user(0).to_bytes()).unwrap();
    assert!(matches!(
        writer.write(&[0u8]),
        Err(ChannelError::OutOfBounds { .. })
    ));
    writer.close();

    let mut producer = ch.producer();
    assert!(matches!(
        producer.send(user(0), vec![0u8; 2048]),
        Err(ChannelError::PacketTooLarge { .. })
    ));
    // only the packet closed above is queued
    assert_eq!(ch.len(), 1);
}

#[test]
fn rejected_send_leaves_channel_untouched() {
    let ch = ChannelBuilder::new()
        .with_capacity(4)
        .with_max_packet_size(16)
        .build()
        .unwrap();
    let mut producer = ch.producer();

    assert_eq!(
        producer.send(user(1), [0u8; 64]),
        Err(ChannelError::PacketTooLarge {
            requested: HEADER_SIZE + 64,
            max: 16
        })
    );
    assert_eq!(ch.len(), 0);
    assert_eq!(producer.sent(), 0);

    // the next reader sees the next good message, not a truncated one
    producer.send(user(2), [3u8; 8]).unwrap();
    let mut consumer = ch.consumer();
    let (header, payload) = consumer
        .receive_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(header, user(2));
    assert_eq!(payload, [3u8; 8]);
    assert!(ch.is_empty());
}

#[test]
fn payload_waits_for_close_after_early_size_commit() {
    let ch = channel(4);
    let mut writer = ch.packet();
    writer.open_write().unwrap();
    writer.set_size(HEADER_SIZE + 4).unwrap();

    let closed = Arc::new(AtomicBool::new(false));
    let seen = Arc::clone(&closed);
    let mut reader = ch.packet();
    let handle = thread::spawn(move || {
        reader.open_read().unwrap();
        // size is already committed, so this does not block
        let size = reader.size().unwrap();
        let bytes = reader.map_read(size).unwrap().to_vec();
        assert!(seen.load(Ordering::SeqCst), "payload visible before close");
        reader.close();
        bytes
    });

    writer.write(&user(6).to_bytes()).unwrap();
    writer.write(b"data").unwrap();
    thread::sleep(Duration::from_millis(30));
    closed.store(true, Ordering::SeqCst);
    writer.close();

    let bytes = handle.join().unwrap();
    assert_eq!(&bytes[..HEADER_SIZE], &user(6).to_bytes());
    assert_eq!(&bytes[HEADER_SIZE..], b"data");
}

#[test]
fn read_past_end_is_out_of_bounds() {
    let ch = channel(4);
    ch.producer().send(user(2), [7u8; 3]).unwrap();

    let mut reader = ch.packet();
    reader.open_read().unwrap();
    assert_eq!(reader.size().unwrap(), HEADER_SIZE + 3);
    reader.map_read(HEADER_SIZE).unwrap();
    assert_eq!(
        reader.map_read(4),
        Err(ChannelError::OutOfBounds {
            offset: HEADER_SIZE,
            len: 4,
            size: HEADER_SIZE + 3
        })
    );
    assert_eq!(reader.map_read(3).unwrap(), &[7u8; 3]);
    reader.close();
}

#[test]
fn packet_context_state_errors() {
    let ch = channel(4);
    let mut packet = ch.packet();
    assert!(!packet.is_open());
    assert_eq!(packet.size(), Err(ChannelError::NotOpen));
    assert_eq!(packet.write(b"x"), Err(ChannelError::NotOpen));
    // closing an idle context is a no-op
    packet.close();

    packet.open_write().unwrap();
    assert_eq!(packet.mode(), Some(PacketMode::Write));
    assert_eq!(packet.open_read(), Err(ChannelError::AlreadyOpen));
    assert_eq!(packet.map_read(1), Err(ChannelError::WrongMode("write")));
    packet.set_size(HEADER_SIZE).unwrap();
    packet.write(&user(0).to_bytes()).unwrap();
    packet.close();

    packet.open_read().unwrap();
    assert_eq!(packet.mode(), Some(PacketMode::Read));
    assert_eq!(packet.write(b"x"), Err(ChannelError::WrongMode("read")));
    assert_eq!(packet.set_size(1), Err(ChannelError::WrongMode("read")));
    packet.destroy();
}

#[test]
fn early_reader_close_releases_the_slot() {
    let ch = channel(1);
    let mut writer = ch.packet();
    let mut reader = ch.packet();

    writer.open_write().unwrap();
    reader.open_read().unwrap();
    // reader gives up before the writer is done
    reader.close();

    writer.write(&user(1).to_bytes()).unwrap();
    writer.close();

    // single slot: this would block if the slot had not been released
    ch.producer().send(user(2), b"next").unwrap();
    let (header, payload) = ch.consumer().receive().unwrap();
    assert_eq!(header, user(2));
    assert_eq!(payload, b"next");
}

#[test]
fn dropped_packet_context_closes_its_packet() {
    let ch = channel(2);
    {
        let mut writer = ch.packet();
        writer.open_write().unwrap();
        writer.set_size(HEADER_SIZE + 2).unwrap();
        writer.write(&user(4).to_bytes()).unwrap();
        writer.write(b"ok").unwrap();
    }
    let (header, payload) = ch.consumer().receive().unwrap();
    assert_eq!(header, user(4));
    assert_eq!(payload, b"ok");
}

#[test]
fn session_cancels_registered_channels() {
    let session = Session::new();
    let a = channel(2);
    let b = channel(2);
    session.register(&a);
    session.register(&a);
    assert!(!session.is_cancelled());

    session.cancel();
    assert!(session.is_cancelled());
    assert!(a.is_cancelled());
    assert!(!b.is_cancelled());

    // late registration is cancelled on the spot
    session.register(&b);
    assert!(b.is_cancelled());
}

#[test]
fn session_forgets_dropped_channels() {
    let session = Session::new();
    let kept = channel(2);
    {
        let gone = channel(2);
        session.register(&gone);
        session.register(&kept);
        assert_eq!(session.registered(), 2);
    }
    assert_eq!(session.registered(), 1);

    // re-registering prunes the dead entry and does not duplicate the live one
    session.register(&kept);
    assert_eq!(session.registered(), 1);

    // a packet context keeps its channel registered after the handle is gone
    let short = channel(2);
    let mut packet = short.packet();
    session.register(&short);
    drop(short);
    assert_eq!(session.registered(), 2);

    session.cancel();
    assert!(kept.is_cancelled());
    assert_eq!(packet.open_write(), Err(ChannelError::Cancelled));
    drop(packet);
    assert_eq!(session.registered(), 1);
}
