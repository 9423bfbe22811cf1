//! Error types for the bridge.
//!
//! Only start-time failures (spawning the decoder, opening its pipe, growing the
//! conversion buffer) are errors. Short or failed writes while streaming are
//! reported through [`crate::channel::WriteOutcome`] instead.

use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// The decoder process could not be spawned.
    #[error("failed to spawn decoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The pipe to the decoder could not be set up.
    #[error("decoder pipe error: {0}")]
    Pipe(String),

    /// The conversion buffer could not grow.
    #[error("failed to allocate conversion buffer for {slots} samples: {source}")]
    Allocation {
        slots: usize,
        #[source]
        source: TryReserveError,
    },

    /// Output buffer presence does not match the configured mode.
    #[error("port mismatch: {0}")]
    Arity(String),

    /// I/O error on a sample source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WAV read or write failed.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Unsupported or malformed sample format.
    #[error("format error: {0}")]
    Format(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn pipe<S: Into<String>>(msg: S) -> Self {
        Error::Pipe(msg.into())
    }

    pub fn arity<S: Into<String>>(msg: S) -> Self {
        Error::Arity(msg.into())
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// True for errors that must stop the pipeline before any sample is processed.
    pub fn is_fatal_start(&self) -> bool {
        matches!(
            self,
            Error::Spawn { .. } | Error::Pipe(_) | Error::Allocation { .. }
        )
    }
}
