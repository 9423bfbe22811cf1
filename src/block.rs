use std::marker::PhantomData;
use std::time::Duration;

use crate::buffer::ConversionBuffer;
use crate::channel::{ChannelState, DecoderCommand, SubprocessChannel, WriteOutcome, WriteStats};
use crate::convert::{convert, ConvertMode, ToWire, DEFAULT_SCALE};
use crate::error::{Error, Result};

/// Whether the block re-emits its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Input is copied unchanged to the output port as well
    PassThrough,
    /// No output port; the bridge consumes everything
    Sink,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub sample_rate: f32,
    /// Float-to-i16 factor, ignored for wire input
    pub scale: f32,
    pub mode: BridgeMode,
    /// When false nothing is spawned and samples are not converted
    pub decoder_enabled: bool,
    pub stop_grace: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 2_400_000.0,
            scale: DEFAULT_SCALE,
            mode: BridgeMode::Sink,
            decoder_enabled: true,
            stop_grace: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub chunks: u64,
    pub samples: u64,
    /// Chunks that could not be handed to the decoder because it was not running
    pub skipped_chunks: u64,
}

/// Streaming block that converts samples and pushes them into a decoder process.
///
/// The surrounding pipeline calls `start`, then `process` once per chunk from a
/// single thread, then `stop`. Only `start` (spawn) and buffer growth can fail;
/// pipe trouble while streaming drops data instead.
pub struct BridgeBlock<T: ToWire> {
    config: BridgeConfig,
    channel: SubprocessChannel,
    buffer: ConversionBuffer,
    stats: BlockStats,
    /// Rate the running decoder was started with
    decoder_rate: Option<f32>,
    _sample: PhantomData<T>,
}

impl<T: ToWire> BridgeBlock<T> {
    pub fn new(command: DecoderCommand, config: BridgeConfig) -> Self {
        let channel = SubprocessChannel::new(command).with_stop_grace(config.stop_grace);
        Self {
            config,
            channel,
            buffer: ConversionBuffer::new(),
            stats: BlockStats::default(),
            decoder_rate: None,
            _sample: PhantomData,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn mode(&self) -> BridgeMode {
        self.config.mode
    }

    pub fn rate(&self) -> f32 {
        self.config.sample_rate
    }

    /// Takes effect on the next `start()`; a running decoder keeps its rate.
    pub fn set_rate(&mut self, sample_rate: f32) {
        self.config.sample_rate = sample_rate;
        if let Some(running) = self.decoder_rate {
            if self.channel.is_running() && running != sample_rate {
                log::info!(
                    "sample rate set to {} Hz, decoder keeps {} Hz until restart",
                    sample_rate,
                    running
                );
            }
        }
    }

    pub fn convert_mode(&self) -> ConvertMode {
        if self.config.decoder_enabled {
            T::default_mode(self.config.scale)
        } else {
            ConvertMode::Discard
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if !self.config.decoder_enabled {
            log::info!("decoder disabled, samples will not be forwarded to it");
            return Ok(());
        }
        self.decoder_rate = None;
        self.channel.start(self.config.sample_rate)?;
        self.decoder_rate = Some(self.config.sample_rate);
        Ok(())
    }

    /// Best-effort teardown; safe to call any number of times.
    pub fn stop(&mut self) {
        self.channel.stop();
        self.decoder_rate = None;
    }

    /// Handle one chunk and return how many input samples were consumed.
    ///
    /// In pass-through mode `output` must be given and receives a copy of the
    /// input; in sink mode it must be `None`.
    pub fn process(&mut self, input: &[T], output: Option<&mut [T]>) -> Result<usize> {
        let consumed = match (self.config.mode, output) {
            (BridgeMode::PassThrough, Some(out)) => {
                let n = input.len().min(out.len());
                out[..n].copy_from_slice(&input[..n]);
                n
            }
            (BridgeMode::PassThrough, None) => {
                return Err(Error::arity("pass-through mode needs an output buffer"));
            }
            (BridgeMode::Sink, None) => input.len(),
            (BridgeMode::Sink, Some(_)) => {
                return Err(Error::arity("sink mode has no output port"));
            }
        };
        let input = &input[..consumed];

        self.stats.chunks += 1;
        self.stats.samples += consumed as u64;

        let mode = self.convert_mode();
        if mode == ConvertMode::Discard || consumed == 0 {
            return Ok(consumed);
        }

        self.buffer.ensure_capacity(consumed)?;
        let len = convert(input, self.buffer.as_mut_slice(consumed), mode);

        match self.channel.write(&self.buffer.as_slice(consumed)[..len]) {
            WriteOutcome::NotRunning => {
                self.stats.skipped_chunks += 1;
                if self.stats.skipped_chunks == 1 {
                    log::warn!("decoder is not running, dropping samples");
                }
            }
            // Shortfalls are counted and logged by the channel
            WriteOutcome::Complete(_) | WriteOutcome::Partial { .. } | WriteOutcome::Failed(_) => {}
        }

        Ok(consumed)
    }

    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    pub fn write_stats(&self) -> WriteStats {
        self.channel.stats()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn decoder_pid(&self) -> Option<u32> {
        self.channel.pid()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer_reallocations(&self) -> usize {
        self.buffer.reallocations()
    }
}
