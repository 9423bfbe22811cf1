use std::io::{BufReader, ErrorKind, Read};
use std::net::TcpStream;

use super::{ChunkSource, IqSample, WireSample};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamFormat {
    Int8,
    Int16,
    Int32,
    Float32,
}

impl StreamFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            StreamFormat::Int8 => 2,    // I + Q = 2 bytes
            StreamFormat::Int16 => 4,   // I + Q = 4 bytes
            StreamFormat::Int32 => 8,   // I + Q = 8 bytes
            StreamFormat::Float32 => 8, // I + Q = 8 bytes
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "int8" => Ok(StreamFormat::Int8),
            "int16" => Ok(StreamFormat::Int16),
            "int32" => Ok(StreamFormat::Int32),
            "float32" => Ok(StreamFormat::Float32),
            _ => Err(Error::format(format!(
                "invalid stream format '{}' (use int8, int16, int32, float32)",
                name
            ))),
        }
    }
}

/// Raw interleaved IQ over TCP (or any other byte stream)
pub struct IqStreamReader<R = TcpStream> {
    reader: BufReader<R>,
    format: StreamFormat,
    buffer: Vec<u8>,
}

impl IqStreamReader<TcpStream> {
    pub fn connect(addr: &str, format: StreamFormat) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::from_reader(stream, format))
    }
}

impl<R: Read> IqStreamReader<R> {
    pub fn from_reader(reader: R, format: StreamFormat) -> Self {
        Self {
            reader: BufReader::new(reader),
            format,
            buffer: Vec::new(),
        }
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Fill the staging buffer with up to `num_samples` whole samples.
    /// Returns the number of bytes available; 0 means end of stream.
    fn fill(&mut self, num_samples: usize) -> Result<usize> {
        let bytes_per_sample = self.format.bytes_per_sample();
        self.buffer.resize(num_samples * bytes_per_sample, 0);

        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        // A trailing partial sample at EOF is dropped
        Ok(filled - filled % bytes_per_sample)
    }

    /// Read a chunk of normalized IQ samples from the stream
    /// Returns None on connection close
    pub fn read_chunk(&mut self, num_samples: usize) -> Result<Option<Vec<IqSample>>> {
        let len = self.fill(num_samples)?;
        if len == 0 {
            return Ok(None);
        }
        let bytes = &self.buffer[..len];

        let samples = match self.format {
            StreamFormat::Int8 => bytes
                .chunks_exact(2)
                .map(|chunk| {
                    let i = (chunk[0] as i8) as f32 / 128.0;
                    let q = (chunk[1] as i8) as f32 / 128.0;
                    IqSample::new(i, q)
                })
                .collect(),
            StreamFormat::Int16 => bytes
                .chunks_exact(4)
                .map(|chunk| {
                    let i = i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0;
                    let q = i16::from_le_bytes([chunk[2], chunk[3]]) as f32 / 32768.0;
                    IqSample::new(i, q)
                })
                .collect(),
            StreamFormat::Int32 => bytes
                .chunks_exact(8)
                .map(|chunk| {
                    let i = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as f32
                        / 2147483648.0;
                    let q = i32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as f32
                        / 2147483648.0;
                    IqSample::new(i, q)
                })
                .collect(),
            StreamFormat::Float32 => bytes
                .chunks_exact(8)
                .map(|chunk| {
                    let i = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    let q = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
                    IqSample::new(i, q)
                })
                .collect(),
        };

        Ok(Some(samples))
    }

    /// Read int16 samples untouched, for feeding the decoder without rescaling
    pub fn read_wire_chunk(&mut self, num_samples: usize) -> Result<Option<Vec<WireSample>>> {
        if self.format != StreamFormat::Int16 {
            return Err(Error::format(format!(
                "wire samples need an int16 stream, got {:?}",
                self.format
            )));
        }
        let len = self.fill(num_samples)?;
        if len == 0 {
            return Ok(None);
        }

        let samples = self.buffer[..len]
            .chunks_exact(4)
            .map(|chunk| WireSample::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Some(samples))
    }
}

impl<R: Read> ChunkSource<IqSample> for IqStreamReader<R> {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Option<Vec<IqSample>>> {
        self.read_chunk(max_samples)
    }
}

impl<R: Read> ChunkSource<WireSample> for IqStreamReader<R> {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Option<Vec<WireSample>>> {
        self.read_wire_chunk(max_samples)
    }
}
