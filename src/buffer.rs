use crate::error::{Error, Result};
use crate::input::WIRE_SAMPLE_BYTES;

/// Grow-only scratch space for converted samples.
///
/// Sized in wire samples. Reallocates only when a chunk is larger than
/// anything seen before, so steady-state processing does not allocate.
#[derive(Debug, Default)]
pub struct ConversionBuffer {
    data: Vec<u8>,
    reallocations: usize,
}

impl ConversionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity in wire samples
    pub fn capacity(&self) -> usize {
        self.data.len() / WIRE_SAMPLE_BYTES
    }

    /// How many times the backing storage has grown
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Make room for at least `slots` wire samples; never shrinks.
    pub fn ensure_capacity(&mut self, slots: usize) -> Result<()> {
        if slots <= self.capacity() {
            return Ok(());
        }

        // Saturates on overflow; usize::MAX bytes can never be reserved
        let bytes = slots.saturating_mul(WIRE_SAMPLE_BYTES);
        self.data
            .try_reserve_exact(bytes - self.data.len())
            .map_err(|source| Error::Allocation { slots, source })?;
        self.data.resize(bytes, 0);
        self.reallocations += 1;

        log::debug!("conversion buffer grown to {} samples", slots);
        Ok(())
    }

    /// Writable bytes for the first `slots` samples
    pub fn as_mut_slice(&mut self, slots: usize) -> &mut [u8] {
        &mut self.data[..slots * WIRE_SAMPLE_BYTES]
    }

    /// Bytes for the first `slots` samples
    pub fn as_slice(&self, slots: usize) -> &[u8] {
        &self.data[..slots * WIRE_SAMPLE_BYTES]
    }
}
