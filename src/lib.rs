//! Bridge a stream of IQ samples into an external decoder process.
//!
//! [`BridgeBlock`] is driven by a pipeline one chunk at a time. It converts each
//! chunk to little-endian interleaved `i16` pairs and writes them to the stdin
//! of a decoder it spawns on `start()` and kills on `stop()`.

pub mod block;
pub mod buffer;
pub mod channel;
pub mod convert;
pub mod error;
pub mod feed;
pub mod input;
pub mod output;

pub use block::{BlockStats, BridgeBlock, BridgeConfig, BridgeMode};
pub use buffer::ConversionBuffer;
pub use channel::{ChannelState, DecoderCommand, SubprocessChannel, WriteOutcome, WriteStats};
pub use convert::{convert, ConvertMode, ToWire, DEFAULT_SCALE};
pub use error::{Error, Result};
pub use input::{IqSample, WireSample};
