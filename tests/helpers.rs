//! Test helpers: throwaway decoders built from `sh` and `cat`, and sample generators

#![allow(dead_code)]

use std::f32::consts::PI;
use std::fs;
use std::path::Path;

use iq_bridge::channel::RATE_PLACEHOLDER;
use iq_bridge::{DecoderCommand, IqSample, WireSample};

/// Decoder that copies its stdin to `data` and records its startup rate in `rate`
pub fn capture_decoder(data: &Path, rate: &Path) -> DecoderCommand {
    DecoderCommand::new("sh")
        .args([
            "-c",
            "printf %s \"$0\" > \"$1\"; exec cat > \"$2\"",
            RATE_PLACEHOLDER,
            rate.to_str().expect("utf-8 path"),
            data.to_str().expect("utf-8 path"),
        ])
        .quiet(true)
}

/// Decoder that exits straight away with the given code
pub fn exiting_decoder(code: i32) -> DecoderCommand {
    DecoderCommand::new("sh")
        .args(["-c".to_string(), format!("exit {}", code), RATE_PLACEHOLDER.to_string()])
        .quiet(true)
}

/// Decoder that drains its stdin to /dev/null
pub fn null_decoder() -> DecoderCommand {
    DecoderCommand::new("sh")
        .args(["-c", "exec cat > /dev/null", RATE_PLACEHOLDER])
        .quiet(true)
}

/// Decoder that stays alive with its stdin open but never reads it
pub fn stalled_decoder() -> DecoderCommand {
    DecoderCommand::new("sh")
        .args(["-c", "exec sleep 30", RATE_PLACEHOLDER])
        .quiet(true)
}

/// Complex tone with amplitude `amplitude`, normalized float IQ
pub fn tone(frequency: f32, sample_rate: f32, num_samples: usize, amplitude: f32) -> Vec<IqSample> {
    let angular_freq = 2.0 * PI * frequency / sample_rate;
    (0..num_samples)
        .map(|n| {
            let phase = angular_freq * n as f32;
            IqSample::new(amplitude * phase.cos(), amplitude * phase.sin())
        })
        .collect()
}

/// Decode a captured pipe dump back into wire samples
pub fn read_wire(path: &Path) -> Vec<WireSample> {
    let bytes = fs::read(path).expect("read capture");
    assert_eq!(bytes.len() % 4, 0, "capture holds a partial sample");
    bytes
        .chunks_exact(4)
        .map(|c| WireSample::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
