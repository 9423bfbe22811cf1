use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{ChunkSource, IqSample, WireSample};
use crate::error::{Error, Result};

/// Read IQ samples from an SDR++ style WAV file, one chunk at a time
/// SDR++ saves IQ as stereo: I=left channel, Q=right channel
pub struct WavChunkReader<R: Read = BufReader<File>> {
    reader: WavReader<R>,
}

impl WavChunkReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(WavReader::open(path)?)
    }
}

impl<R: Read> WavChunkReader<R> {
    pub fn new(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();

        // Validate format
        if spec.channels != 2 {
            return Err(Error::format(format!(
                "Expected stereo WAV (I/Q), got {} channels",
                spec.channels
            )));
        }

        Ok(Self { reader })
    }

    pub fn spec(&self) -> hound::WavSpec {
        self.reader.spec()
    }

    /// Number of IQ pairs in the file
    pub fn total_samples(&self) -> usize {
        self.reader.len() as usize / 2
    }

    /// True when the file holds 16-bit integer PCM, i.e. wire samples already
    pub fn is_wire_format(&self) -> bool {
        let spec = self.reader.spec();
        spec.sample_format == SampleFormat::Int && spec.bits_per_sample == 16
    }

    pub fn read_chunk(&mut self, num_samples: usize) -> Result<Option<Vec<IqSample>>> {
        let spec = self.reader.spec();
        let mut samples = Vec::with_capacity(num_samples);

        match spec.sample_format {
            SampleFormat::Float => {
                let mut iter = self.reader.samples::<f32>();
                while samples.len() < num_samples {
                    let (Some(i), Some(q)) = (iter.next(), iter.next()) else {
                        break;
                    };
                    samples.push(IqSample::new(i?, q?));
                }
            }
            SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
                let mut iter = self.reader.samples::<i32>();
                while samples.len() < num_samples {
                    let (Some(i), Some(q)) = (iter.next(), iter.next()) else {
                        break;
                    };
                    samples.push(IqSample::new(i? as f32 / max_val, q? as f32 / max_val));
                }
            }
        }

        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(samples))
    }

    pub fn read_wire_chunk(&mut self, num_samples: usize) -> Result<Option<Vec<WireSample>>> {
        if !self.is_wire_format() {
            return Err(Error::format("wire samples need a 16-bit integer WAV"));
        }

        let mut samples = Vec::with_capacity(num_samples);
        let mut iter = self.reader.samples::<i16>();
        while samples.len() < num_samples {
            let (Some(i), Some(q)) = (iter.next(), iter.next()) else {
                break;
            };
            samples.push(WireSample::new(i?, q?));
        }

        if samples.is_empty() {
            return Ok(None);
        }
        Ok(Some(samples))
    }
}

impl<R: Read> ChunkSource<IqSample> for WavChunkReader<R> {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Option<Vec<IqSample>>> {
        self.read_chunk(max_samples)
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(self.reader.spec().sample_rate)
    }
}

impl<R: Read> ChunkSource<WireSample> for WavChunkReader<R> {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Option<Vec<WireSample>>> {
        self.read_wire_chunk(max_samples)
    }

    fn sample_rate(&self) -> Option<u32> {
        Some(self.reader.spec().sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use std::io::Cursor;

    fn int16_wav(pairs: &[(i16, i16)]) -> Vec<u8> {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 2_400_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &(i, q) in pairs {
                writer.write_sample(i).unwrap();
                writer.write_sample(q).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_int16_wav_in_chunks() {
        let bytes = int16_wav(&[(16384, -16384), (0, 0), (-32768, 32767)]);
        let mut reader = WavChunkReader::new(WavReader::new(Cursor::new(bytes)).unwrap()).unwrap();
        assert_eq!(reader.total_samples(), 3);
        assert!(reader.is_wire_format());

        let first = reader.read_chunk(2).unwrap().unwrap();
        assert_eq!(first, vec![IqSample::new(0.5, -0.5), IqSample::new(0.0, 0.0)]);
        let rest = reader.read_chunk(2).unwrap().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].i, -1.0);
        assert!(reader.read_chunk(2).unwrap().is_none());
    }

    #[test]
    fn test_int16_wav_as_wire_samples() {
        let bytes = int16_wav(&[(100, -200), (300, -400)]);
        let mut reader = WavChunkReader::new(WavReader::new(Cursor::new(bytes)).unwrap()).unwrap();
        let chunk = reader.read_wire_chunk(16).unwrap().unwrap();
        assert_eq!(chunk, vec![WireSample::new(100, -200), WireSample::new(300, -400)]);
    }

    #[test]
    fn test_mono_wav_rejected() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0i16).unwrap();
            writer.finalize().unwrap();
        }
        let reader = WavReader::new(Cursor::new(cursor.into_inner())).unwrap();
        assert!(matches!(WavChunkReader::new(reader), Err(Error::Format(_))));
    }
}
