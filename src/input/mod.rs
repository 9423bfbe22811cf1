pub mod wav;
pub mod stream;

pub use stream::{IqStreamReader, StreamFormat};
pub use wav::WavChunkReader;

use crate::error::Result;

/// Bytes per wire sample: little-endian i16 I followed by i16 Q.
pub const WIRE_SAMPLE_BYTES: usize = 4;

/// IQ sample pair (In-phase, Quadrature), normalized to [-1.0, 1.0)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IqSample {
    pub i: f32,
    pub q: f32,
}

impl IqSample {
    pub fn new(i: f32, q: f32) -> Self {
        Self { i, q }
    }
}

/// Fixed-point IQ pair as the decoder reads it off its pipe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireSample {
    pub i: i16,
    pub q: i16,
}

impl WireSample {
    pub fn new(i: i16, q: i16) -> Self {
        Self { i, q }
    }

    pub fn to_le_bytes(self) -> [u8; WIRE_SAMPLE_BYTES] {
        let i = self.i.to_le_bytes();
        let q = self.q.to_le_bytes();
        [i[0], i[1], q[0], q[1]]
    }

    pub fn from_le_bytes(bytes: [u8; WIRE_SAMPLE_BYTES]) -> Self {
        Self {
            i: i16::from_le_bytes([bytes[0], bytes[1]]),
            q: i16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Map back to floats with the scale used for conversion
    pub fn dequantize(self, scale: f32) -> IqSample {
        IqSample::new(self.i as f32 / scale, self.q as f32 / scale)
    }
}

/// Anything that hands out chunks of samples until it runs dry
pub trait ChunkSource<T> {
    /// Read up to `max_samples`; `None` once the source is exhausted
    fn next_chunk(&mut self, max_samples: usize) -> Result<Option<Vec<T>>>;

    fn sample_rate(&self) -> Option<u32> {
        None
    }
}
