//! End-to-end tests: samples go through a `BridgeBlock` into a real child process
//! whose stdin is captured to a file.

#![cfg(unix)]

mod helpers;

use std::fs;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use iq_bridge::{
    BridgeBlock, BridgeConfig, BridgeMode, ChannelState, DecoderCommand, Error, IqSample, ToWire,
    WireSample, DEFAULT_SCALE,
};

fn draining(mode: BridgeMode) -> BridgeConfig {
    BridgeConfig {
        mode,
        // Let `cat` flush to disk on EOF before it would be killed
        stop_grace: Duration::from_secs(5),
        ..BridgeConfig::default()
    }
}

#[test]
fn test_pinned_chunk_reaches_decoder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("pipe.bin");
    let rate = dir.path().join("rate.txt");

    let mut block: BridgeBlock<IqSample> =
        BridgeBlock::new(helpers::capture_decoder(&data, &rate), draining(BridgeMode::Sink));
    block.start().expect("start decoder");

    let chunk = [
        IqSample::new(0.5, 0.5),
        IqSample::new(-1.0, -1.0),
        IqSample::new(0.0, 0.0),
        IqSample::new(0.999, -0.999),
    ];
    assert_eq!(block.process(&chunk, None).unwrap(), 4);
    block.stop();

    assert_eq!(
        helpers::read_wire(&data),
        vec![
            WireSample::new(16384, 16384),
            WireSample::new(-32768, -32768),
            WireSample::new(0, 0),
            WireSample::new(32735, -32735),
        ]
    );
    assert_eq!(fs::read_to_string(&rate).unwrap(), "2400000");
}

#[test]
fn test_pass_through_varying_chunks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("pipe.bin");
    let rate = dir.path().join("rate.txt");

    let mut block: BridgeBlock<IqSample> = BridgeBlock::new(
        helpers::capture_decoder(&data, &rate),
        draining(BridgeMode::PassThrough),
    );
    block.start().expect("start decoder");

    let signal = helpers::tone(1000.0, 48_000.0, 6000, 0.8);
    let mut expected = Vec::new();
    let mut offset = 0;
    let mut last_capacity = 0;
    for size in [0, 1, 7, 4096, 3, 1000, 893] {
        let chunk = &signal[offset..offset + size];
        let mut out = vec![IqSample::default(); size];

        assert_eq!(block.process(chunk, Some(&mut out[..])).unwrap(), size);
        assert_eq!(out, chunk);

        assert!(block.buffer_capacity() >= size);
        assert!(block.buffer_capacity() >= last_capacity);
        last_capacity = block.buffer_capacity();

        expected.extend(chunk.iter().map(|s| s.to_wire(DEFAULT_SCALE)));
        offset += size;
    }
    // Growth only at 1, 7 and 4096
    assert_eq!(block.buffer_reallocations(), 3);
    assert_eq!(block.buffer_capacity(), 4096);
    block.stop();

    let captured = helpers::read_wire(&data);
    assert_eq!(captured.len(), 6000);
    assert_eq!(captured, expected);

    let stats = block.write_stats();
    assert_eq!(stats.bytes_written, 6000 * 4);
    assert_eq!(stats.bytes_dropped(), 0);
    assert_eq!(block.stats().samples, 6000);
}

#[test]
fn test_wire_input_is_copied_verbatim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("pipe.bin");
    let rate = dir.path().join("rate.txt");

    let mut block: BridgeBlock<WireSample> =
        BridgeBlock::new(helpers::capture_decoder(&data, &rate), draining(BridgeMode::Sink));
    block.start().expect("start decoder");

    let chunk: Vec<WireSample> = (0..512)
        .map(|k| WireSample::new((k * 64 - 16384) as i16, (16384 - k * 64) as i16))
        .collect();
    assert_eq!(block.process(&chunk, None).unwrap(), 512);
    block.stop();

    assert_eq!(helpers::read_wire(&data), chunk);
}

#[test]
fn test_failed_start_never_writes() {
    let mut block: BridgeBlock<IqSample> = BridgeBlock::new(
        DecoderCommand::new("/nonexistent/dump1090"),
        BridgeConfig::default(),
    );
    let err = block.start().unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }));
    assert!(err.is_fatal_start());
    assert_eq!(block.channel_state(), ChannelState::Absent);

    let chunk = helpers::tone(10.0, 1000.0, 256, 0.5);
    assert_eq!(block.process(&chunk, None).unwrap(), 256);
    assert_eq!(block.write_stats().writes, 0);
    assert_eq!(block.stats().skipped_chunks, 1);

    block.stop();
    block.stop();
    assert_eq!(block.channel_state(), ChannelState::Absent);
}

#[test]
fn test_stop_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("pipe.bin");
    let rate = dir.path().join("rate.txt");

    let mut block: BridgeBlock<IqSample> =
        BridgeBlock::new(helpers::capture_decoder(&data, &rate), BridgeConfig::default());
    block.stop();
    assert_eq!(block.channel_state(), ChannelState::Absent);

    block.start().unwrap();
    assert_eq!(block.channel_state(), ChannelState::Running);
    block.stop();
    block.stop();
    assert_eq!(block.channel_state(), ChannelState::Stopped);
    assert!(block.decoder_pid().is_none());
}

#[test]
fn test_rate_change_applies_on_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data = dir.path().join("pipe.bin");
    let rate = dir.path().join("rate.txt");

    let mut block: BridgeBlock<IqSample> =
        BridgeBlock::new(helpers::capture_decoder(&data, &rate), draining(BridgeMode::Sink));
    block.start().unwrap();
    let first_pid = block.decoder_pid();

    block.set_rate(2_000_000.0);
    assert_eq!(block.rate(), 2_000_000.0);
    // Same child, old rate
    assert_eq!(block.decoder_pid(), first_pid);
    block.stop();
    assert_eq!(fs::read_to_string(&rate).unwrap(), "2400000");

    block.start().unwrap();
    assert_ne!(block.decoder_pid(), first_pid);
    block.stop();
    assert_eq!(fs::read_to_string(&rate).unwrap(), "2000000");
}

#[test]
fn test_dead_decoder_does_not_stall_processing() {
    let mut block: BridgeBlock<IqSample> =
        BridgeBlock::new(helpers::exiting_decoder(1), BridgeConfig::default());
    block.start().unwrap();

    let chunk = helpers::tone(100.0, 48_000.0, 4096, 0.9);
    let deadline = Instant::now() + Duration::from_secs(10);
    while block.write_stats().failed_writes == 0 && Instant::now() < deadline {
        assert_eq!(block.process(&chunk, None).unwrap(), 4096);
        thread::sleep(Duration::from_millis(5));
    }

    let stats = block.write_stats();
    assert!(stats.failed_writes > 0);
    assert!(stats.bytes_dropped() > 0);
    // Still absorbing chunks after the failure
    assert_eq!(block.process(&chunk, None).unwrap(), 4096);
    block.stop();
    assert_eq!(block.channel_state(), ChannelState::Stopped);
}

#[test]
fn test_stalled_decoder_does_not_block_processing() {
    let mut block: BridgeBlock<IqSample> =
        BridgeBlock::new(helpers::stalled_decoder(), BridgeConfig::default());
    block.start().unwrap();
    let pid = block.decoder_pid();

    // Worker thread, so a blocking write fails the test instead of hanging it
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // 256 KiB per chunk, several times the pipe buffer
        let chunk = vec![IqSample::new(0.1, -0.1); 65536];
        let consumed: Vec<usize> = (0..4).map(|_| block.process(&chunk, None).unwrap()).collect();
        let _ = tx.send((consumed, block));
    });
    let (consumed, mut block) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("process() blocked on a decoder that does not read");

    assert_eq!(consumed, vec![65536; 4]);
    let stats = block.write_stats();
    assert_eq!(stats.writes, 4);
    assert!(stats.partial_writes + stats.failed_writes > 0);
    assert!(stats.bytes_dropped() > 0);
    assert_eq!(stats.bytes_requested, 4 * 65536 * 4);
    assert_eq!(block.stats().skipped_chunks, 0);

    // The decoder was never restarted
    assert_eq!(block.decoder_pid(), pid);
    assert_eq!(block.channel_state(), ChannelState::Running);
    block.stop();
    assert_eq!(block.channel_state(), ChannelState::Stopped);
}
