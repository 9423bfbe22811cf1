//! Sample conversion into the decoder's wire format.
//!
//! The decoder reads a flat run of little-endian `i16` pairs (I, Q, I, Q, ...).
//! Float samples are scaled, rounded to nearest and saturated; wire samples are
//! copied as they are.

use crate::input::{IqSample, WireSample, WIRE_SAMPLE_BYTES};

/// Maps [-1.0, 1.0) onto the full signed 16-bit range.
///
/// Not the nominal 65536.0: only 32768.0 saturates 1.0 at `i16::MAX` while keeping
/// the rounding error within `1/scale` over [-1.0, 1.0).
pub const DEFAULT_SCALE: f32 = 32768.0;

/// How a block turns its input into pipe bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvertMode {
    /// Float samples, scaled by the given factor
    Scale(f32),
    /// Input is already in wire format
    Identity,
    /// Nothing is converted or written
    Discard,
}

/// Round and saturate one scaled component
#[inline]
pub fn quantize(value: f32, scale: f32) -> i16 {
    // `as` maps NaN to 0 and saturates the rest, clamp keeps that explicit
    (value * scale).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Input sample types the bridge accepts
pub trait ToWire: Copy {
    /// Conversion used when the block is not told otherwise
    fn default_mode(scale: f32) -> ConvertMode;

    fn to_wire(self, scale: f32) -> WireSample;
}

impl ToWire for IqSample {
    fn default_mode(scale: f32) -> ConvertMode {
        ConvertMode::Scale(scale)
    }

    #[inline]
    fn to_wire(self, scale: f32) -> WireSample {
        WireSample::new(quantize(self.i, scale), quantize(self.q, scale))
    }
}

impl ToWire for WireSample {
    fn default_mode(_scale: f32) -> ConvertMode {
        ConvertMode::Identity
    }

    #[inline]
    fn to_wire(self, _scale: f32) -> WireSample {
        self
    }
}

/// Convert `src` into `dst` as interleaved little-endian i16 pairs.
///
/// `dst` must hold at least `src.len() * WIRE_SAMPLE_BYTES` bytes. Returns the
/// number of bytes produced: zero in [`ConvertMode::Discard`].
pub fn convert<T: ToWire>(src: &[T], dst: &mut [u8], mode: ConvertMode) -> usize {
    let scale = match mode {
        ConvertMode::Discard => return 0,
        ConvertMode::Scale(scale) => scale,
        ConvertMode::Identity => 1.0,
    };

    let len = src.len() * WIRE_SAMPLE_BYTES;
    debug_assert!(dst.len() >= len, "conversion buffer too small");

    for (sample, slot) in src.iter().zip(dst[..len].chunks_exact_mut(WIRE_SAMPLE_BYTES)) {
        slot.copy_from_slice(&sample.to_wire(scale).to_le_bytes());
    }
    len
}
