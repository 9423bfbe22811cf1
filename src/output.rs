use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use crate::error::Result;
use crate::input::{IqSample, WireSample};

/// Samples that can be written as one stereo WAV frame
pub trait WavFrame: Copy {
    const BITS_PER_SAMPLE: u16;
    const SAMPLE_FORMAT: SampleFormat;

    fn write_frame<W: Write + Seek>(self, writer: &mut WavWriter<W>) -> Result<()>;
}

/// Float samples go out as float32 (inspectrum, SDR++)
impl WavFrame for IqSample {
    const BITS_PER_SAMPLE: u16 = 32;
    const SAMPLE_FORMAT: SampleFormat = SampleFormat::Float;

    fn write_frame<W: Write + Seek>(self, writer: &mut WavWriter<W>) -> Result<()> {
        writer.write_sample(self.i)?;
        writer.write_sample(self.q)?;
        Ok(())
    }
}

/// Wire samples go out as int16 PCM (URH and most tools)
impl WavFrame for WireSample {
    const BITS_PER_SAMPLE: u16 = 16;
    const SAMPLE_FORMAT: SampleFormat = SampleFormat::Int;

    fn write_frame<W: Write + Seek>(self, writer: &mut WavWriter<W>) -> Result<()> {
        writer.write_sample(self.i)?;
        writer.write_sample(self.q)?;
        Ok(())
    }
}

/// Stereo IQ WAV receiving the bridge's pass-through output
pub struct TeeWriter<W: Write + Seek = BufWriter<File>> {
    writer: WavWriter<W>,
    frames: usize,
}

impl TeeWriter<BufWriter<File>> {
    pub fn create<T: WavFrame, P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            writer: WavWriter::create(path, spec_for::<T>(sample_rate))?,
            frames: 0,
        })
    }
}

impl<W: Write + Seek> TeeWriter<W> {
    pub fn new<T: WavFrame>(inner: W, sample_rate: u32) -> Result<Self> {
        Ok(Self {
            writer: WavWriter::new(inner, spec_for::<T>(sample_rate))?,
            frames: 0,
        })
    }

    pub fn write<T: WavFrame>(&mut self, samples: &[T]) -> Result<()> {
        for &sample in samples {
            sample.write_frame(&mut self.writer)?;
        }
        self.frames += samples.len();
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

fn spec_for<T: WavFrame>(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: T::BITS_PER_SAMPLE,
        sample_format: T::SAMPLE_FORMAT,
    }
}
