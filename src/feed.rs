use std::fs::File;
use std::io::{BufWriter, Seek, Write};

use crate::block::{BridgeBlock, BridgeMode};
use crate::convert::ToWire;
use crate::error::{Error, Result};
use crate::input::ChunkSource;
use crate::output::{TeeWriter, WavFrame};

/// Totals for one run of the feed loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    pub chunks: u64,
    pub samples: u64,
}

/// Pull chunks from `source` until it runs dry and push each through `block`.
///
/// In pass-through mode the block's output goes to `tee`, which must then be
/// given. The block must already be started.
pub fn feed<T, S, W>(
    source: &mut S,
    block: &mut BridgeBlock<T>,
    chunk_size: usize,
    mut tee: Option<&mut TeeWriter<W>>,
) -> Result<FeedSummary>
where
    T: ToWire + WavFrame + Default,
    S: ChunkSource<T>,
    W: Write + Seek,
{
    if chunk_size == 0 {
        return Err(Error::config("chunk size must be at least one sample"));
    }
    if block.mode() == BridgeMode::PassThrough && tee.is_none() {
        return Err(Error::config("pass-through mode needs somewhere to put the output"));
    }

    let mut summary = FeedSummary::default();
    let mut out: Vec<T> = Vec::new();

    while let Some(chunk) = source.next_chunk(chunk_size)? {
        let consumed = match block.mode() {
            BridgeMode::Sink => block.process(&chunk, None)?,
            BridgeMode::PassThrough => {
                out.resize(chunk.len(), T::default());
                let n = block.process(&chunk, Some(&mut out[..]))?;
                if let Some(tee) = tee.as_deref_mut() {
                    tee.write(&out[..n])?;
                }
                n
            }
        };

        summary.chunks += 1;
        summary.samples += consumed as u64;
        if summary.chunks % 1000 == 0 {
            let stats = block.write_stats();
            log::debug!(
                "{} chunks, {} samples, {} bytes to decoder, {} dropped",
                summary.chunks,
                summary.samples,
                stats.bytes_written,
                stats.bytes_dropped()
            );
        }
    }

    Ok(summary)
}

/// Sink-mode convenience wrapper with no tee
pub fn feed_sink<T, S>(source: &mut S, block: &mut BridgeBlock<T>, chunk_size: usize) -> Result<FeedSummary>
where
    T: ToWire + WavFrame + Default,
    S: ChunkSource<T>,
{
    feed::<T, S, BufWriter<File>>(source, block, chunk_size, None)
}
