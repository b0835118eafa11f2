// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::crossbeam_channel::{
    self,
    Receiver as ChannelReceiver,
    Sender,
};
use ::rand::{
    rngs::SmallRng,
    seq::SliceRandom,
    Rng,
    SeedableRng,
};
use ::std::thread::{
    self,
    JoinHandle,
};
use ::tcpreass::{
    ensure_eq,
    DeliveryFlags,
    ReassemblyConfig,
    ReceiveQueue,
    Receiver,
    SegmentBuffer,
    SeqNumber,
    SharedAccountant,
    SharedSegmentPool,
};

//======================================================================================================================
// Helper Functions
//======================================================================================================================

/// Builds an established connection engine along with handles to its shared pool and accountant.
fn setup(
    receive_next: u32,
    config: &ReassemblyConfig,
) -> (Receiver<ReceiveQueue>, SharedSegmentPool, SharedAccountant) {
    let pool: SharedSegmentPool = SharedSegmentPool::new(config);
    let accountant: SharedAccountant = SharedAccountant::new(config);
    let mut engine: Receiver<ReceiveQueue> = Receiver::new(
        SeqNumber::from(receive_next),
        pool.clone(),
        accountant.clone(),
        ReceiveQueue::new(),
    );
    let _ = engine.set_established();
    (engine, pool, accountant)
}

/// Feeds one data segment into the engine.
fn push(engine: &mut Receiver<ReceiveQueue>, seq: u32, bytes: &[u8]) -> DeliveryFlags {
    engine.reassemble(SeqNumber::from(seq), SegmentBuffer::from_slice(bytes), false)
}

/// Drains every delivered payload out of the engine's sink.
fn drain(engine: &mut Receiver<ReceiveQueue>) -> Vec<u8> {
    let mut bytes: Vec<u8> = Vec::new();
    while let Some(payload) = engine.sink_mut().pop() {
        bytes.extend_from_slice(&payload[..]);
    }
    bytes
}

/// Byte pattern for the stream position `seq`.
fn pattern(seq: u32, len: usize) -> Vec<u8> {
    (0..len).map(|i| (seq as usize + i) as u8).collect()
}

//======================================================================================================================
// Ordering and Delivery
//======================================================================================================================

/// An out-of-order segment waits behind its gap; filling the gap delivers both in order.
#[test]
fn gap_then_fill_delivers_in_order() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, pool, accountant) = setup(1000, &config);

    // A segment past the expected byte leaves a gap and nothing to present.
    let flags: DeliveryFlags = push(&mut engine, 1050, &pattern(1050, 50));
    ensure_eq!(flags.end_of_stream, false);
    ensure_eq!(engine.queue_length(), 1);
    ensure_eq!(engine.receive_next(), SeqNumber::from(1000));

    // The gap-filling segment unblocks both.
    let flags: DeliveryFlags = push(&mut engine, 1000, &pattern(1000, 50));
    ensure_eq!(flags.end_of_stream, false);
    ensure_eq!(engine.receive_next(), SeqNumber::from(1100));
    ensure_eq!(engine.sink().nbytes(), 100);
    ensure_eq!(drain(&mut engine), pattern(1000, 100));

    // Every slot went back where it came from.
    ensure_eq!(pool.allocated(), 0);
    ensure_eq!(accountant.queued_segments(), 0);

    Ok(())
}

/// Inserting the same segment twice yields the same queue state and sink output as inserting it once.
#[test]
fn duplicate_insert_is_idempotent() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, pool, accountant) = setup(1000, &config);

    let _ = push(&mut engine, 1050, &pattern(1050, 50));
    let _ = push(&mut engine, 1050, &pattern(1050, 50));

    ensure_eq!(engine.queue_length(), 1);
    ensure_eq!(pool.allocated(), 1);
    ensure_eq!(accountant.duplicate_segments(), 1);
    ensure_eq!(accountant.duplicate_bytes(), 50);

    let _ = push(&mut engine, 1000, &pattern(1000, 50));
    ensure_eq!(drain(&mut engine), pattern(1000, 100));
    ensure_eq!(engine.receive_next(), SeqNumber::from(1100));

    Ok(())
}

/// A wide segment fully covering a queued one evicts it; exactly one run of bytes is delivered.
#[test]
fn full_coverage_evicts_covered_segment() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, pool, accountant) = setup(100, &config);

    let _ = push(&mut engine, 120, &pattern(120, 30));
    ensure_eq!(engine.queue_length(), 1);

    // [100, 200) covers [120, 150) entirely and starts at the receive cursor, so everything presents at once.
    let _ = push(&mut engine, 100, &pattern(100, 100));
    ensure_eq!(engine.receive_next(), SeqNumber::from(200));
    ensure_eq!(drain(&mut engine), pattern(100, 100));
    ensure_eq!(pool.allocated(), 0);
    ensure_eq!(accountant.queued_segments(), 0);

    Ok(())
}

/// Overlap on both sides: the incoming segment is trimmed against its predecessor and shrinks its successor.
#[test]
fn bidirectional_overlap_is_trimmed() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, _, _) = setup(100, &config);

    let _ = push(&mut engine, 100, &pattern(100, 50));
    ensure_eq!(engine.receive_next(), SeqNumber::from(150));

    let _ = push(&mut engine, 200, &pattern(200, 50));
    // [130, 230) re-sends [130, 150), fills [150, 200), and re-sends [200, 230).
    let _ = push(&mut engine, 130, &pattern(130, 100));

    ensure_eq!(engine.receive_next(), SeqNumber::from(250));
    ensure_eq!(drain(&mut engine), pattern(100, 150));

    Ok(())
}

/// Presentation with no intervening insert performs no further mutation.
#[test]
fn presentation_is_idempotent() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, _, _) = setup(1000, &config);

    let _ = push(&mut engine, 1000, &pattern(1000, 25));
    let delivered: usize = engine.sink().nbytes();
    let cursor: SeqNumber = engine.receive_next();

    let flags: DeliveryFlags = engine.present();
    ensure_eq!(flags, DeliveryFlags::default());
    ensure_eq!(engine.receive_next(), cursor);
    ensure_eq!(engine.sink().nbytes(), delivered);

    Ok(())
}

//======================================================================================================================
// Resource Limits
//======================================================================================================================

/// Per-connection limit refuses further out-of-order segments, but never the unblocking one.
#[test]
fn queue_limit_never_starves_the_unblocking_segment() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::new(None, None, Some(2), None);
    let (mut engine, _, accountant) = setup(1000, &config);

    let _ = push(&mut engine, 1100, &pattern(1100, 10));
    let _ = push(&mut engine, 1200, &pattern(1200, 10));
    ensure_eq!(engine.queue_length(), 2);

    // The queue is full: a third out-of-order segment is refused.
    let _ = push(&mut engine, 1300, &pattern(1300, 10));
    ensure_eq!(engine.queue_length(), 2);
    ensure_eq!(accountant.overflows(), 1);

    // The segment at the receive cursor still goes through and unblocks delivery of [1100, 1110).
    let _ = push(&mut engine, 1000, &pattern(1000, 100));
    ensure_eq!(engine.receive_next(), SeqNumber::from(1110));
    ensure_eq!(engine.sink().nbytes(), 110);

    Ok(())
}

/// Descriptor-pool exhaustion drops segments silently; freed slots make the pool usable again.
#[test]
fn pool_exhaustion_is_a_silent_drop() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::new(None, None, None, Some(1));
    let (mut engine, pool, accountant) = setup(1000, &config);

    let _ = push(&mut engine, 1100, &pattern(1100, 10));
    ensure_eq!(pool.allocated(), 1);

    // Even the unblocking segment drops when no descriptor can be allocated.
    let flags: DeliveryFlags = push(&mut engine, 1000, &pattern(1000, 10));
    ensure_eq!(flags, DeliveryFlags::default());
    ensure_eq!(engine.receive_next(), SeqNumber::from(1000));
    ensure_eq!(accountant.overflows(), 1);
    ensure_eq!(accountant.queued_segments(), 1);

    // Tearing the connection down returns the slot.
    drop(engine);
    ensure_eq!(pool.allocated(), 0);
    ensure_eq!(accountant.queued_segments(), 0);

    Ok(())
}

//======================================================================================================================
// Stream Termination
//======================================================================================================================

/// A FIN riding on out-of-order data surfaces only once its segment is delivered in order.
#[test]
fn fin_on_out_of_order_data_surfaces_in_order() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, _, _) = setup(50, &config);

    let flags: DeliveryFlags =
        engine.reassemble(SeqNumber::from(100), SegmentBuffer::from_slice(&pattern(100, 10)), true);
    ensure_eq!(flags.end_of_stream, false);

    let flags: DeliveryFlags = push(&mut engine, 50, &pattern(50, 50));
    ensure_eq!(flags.end_of_stream, true);
    ensure_eq!(engine.receive_next(), SeqNumber::from(110));
    ensure_eq!(drain(&mut engine), pattern(50, 60));

    Ok(())
}

/// A closed sink discards delivered payloads while sequencing still advances.
#[test]
fn closed_sink_discards_but_sequencing_advances() -> Result<()> {
    let config: ReassemblyConfig = ReassemblyConfig::default();
    let (mut engine, pool, accountant) = setup(1000, &config);

    let _ = push(&mut engine, 1050, &pattern(1050, 50));
    engine.sink_mut().close();

    let flags: DeliveryFlags =
        engine.reassemble(SeqNumber::from(1000), SegmentBuffer::from_slice(&pattern(1000, 50)), true);
    ensure_eq!(flags.end_of_stream, true);
    ensure_eq!(engine.receive_next(), SeqNumber::from(1100));
    ensure_eq!(engine.sink().nbytes(), 0);
    ensure_eq!(pool.allocated(), 0);
    ensure_eq!(accountant.queued_segments(), 0);

    Ok(())
}

//======================================================================================================================
// Randomized Arrival
//======================================================================================================================

/// Slices a byte stream into shuffled, partially duplicated segments and expects it back exactly once.
#[test]
fn shuffled_overlapping_stream_reassembles_exactly_once() -> Result<()> {
    const STREAM_LEN: usize = 4096;
    const BASE_SEQ: u32 = 0xffff_f000; // crosses the sequence-number wrap point

    let mut rng: SmallRng = SmallRng::seed_from_u64(7);
    let stream: Vec<u8> = (0..STREAM_LEN).map(|_| rng.gen()).collect();

    // Partition the stream into segments, then add overlapping re-sends of random windows.
    let mut segments: Vec<(usize, usize)> = Vec::new();
    let mut offset: usize = 0;
    while offset < STREAM_LEN {
        let len: usize = rng.gen_range(16..128).min(STREAM_LEN - offset);
        segments.push((offset, len));
        offset += len;
    }
    for _ in 0..64 {
        let start: usize = rng.gen_range(0..STREAM_LEN - 1);
        let len: usize = rng.gen_range(1..256).min(STREAM_LEN - start);
        segments.push((start, len));
    }
    segments.shuffle(&mut rng);

    let config: ReassemblyConfig = ReassemblyConfig::new(None, Some(8192), Some(4096), None);
    let (mut engine, pool, accountant) = setup(BASE_SEQ, &config);

    for (start, len) in segments {
        let seq: u32 = BASE_SEQ.wrapping_add(start as u32);
        let _ = push(&mut engine, seq, &stream[start..start + len]);
    }

    ensure_eq!(engine.receive_next(), SeqNumber::from(BASE_SEQ.wrapping_add(STREAM_LEN as u32)));
    ensure_eq!(drain(&mut engine), stream);
    ensure_eq!(engine.queue_length(), 0);
    ensure_eq!(pool.allocated(), 0);
    ensure_eq!(accountant.queued_segments(), 0);

    Ok(())
}

//======================================================================================================================
// Shared Accounting
//======================================================================================================================

/// Many connections on different threads share one accountant and pool without losing slots.
#[test]
fn accounting_is_consistent_across_threads() -> Result<()> {
    const NTHREADS: usize = 4;
    const CHUNK: usize = 200;

    let config: ReassemblyConfig = ReassemblyConfig::default();
    let pool: SharedSegmentPool = SharedSegmentPool::new(&config);
    let accountant: SharedAccountant = SharedAccountant::new(&config);
    let (tx, rx): (Sender<Vec<u8>>, ChannelReceiver<Vec<u8>>) = crossbeam_channel::unbounded();

    let mut threads: Vec<JoinHandle<()>> = Vec::new();
    for tid in 0..NTHREADS {
        let pool: SharedSegmentPool = pool.clone();
        let accountant: SharedAccountant = accountant.clone();
        let tx: Sender<Vec<u8>> = tx.clone();
        threads.push(thread::spawn(move || {
            let base: u32 = (tid as u32) * 100_000;
            let mut engine: Receiver<ReceiveQueue> =
                Receiver::new(SeqNumber::from(base), pool, accountant, ReceiveQueue::new());
            let _ = engine.set_established();

            // Deliver three chunks in back-to-front order.
            for chunk in [2u32, 1, 0] {
                let seq: u32 = base + chunk * CHUNK as u32;
                let bytes: Vec<u8> = (0..CHUNK).map(|i| (seq as usize + i) as u8).collect();
                let _ = engine.reassemble(SeqNumber::from(seq), SegmentBuffer::from_slice(&bytes), false);
            }

            let mut bytes: Vec<u8> = Vec::new();
            while let Some(payload) = engine.sink_mut().pop() {
                bytes.extend_from_slice(&payload[..]);
            }
            tx.send(bytes).unwrap();
        }));
    }

    for _ in 0..NTHREADS {
        let bytes: Vec<u8> = rx.recv()?;
        ensure_eq!(bytes.len(), 3 * CHUNK);
    }
    for thread in threads {
        if thread.join().is_err() {
            anyhow::bail!("worker thread panicked");
        }
    }

    ensure_eq!(accountant.queued_segments(), 0);
    ensure_eq!(pool.allocated(), 0);

    Ok(())
}
