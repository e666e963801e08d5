//! Error types for the Binix stream bridge

use std::io;

use thiserror::Error;

/// Main error type for stream bridge operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The consumer closed the stream; no further reads are permitted
    #[error("stream closed")]
    Closed,
    /// The producer appended a chunk after signaling end of stream
    #[error("cannot append a chunk after end of stream")]
    AppendAfterEof,
    /// The producer signaled end of stream twice
    #[error("end of stream already signaled")]
    EofAlreadySignaled,
    /// `offset + len` does not fit in the destination buffer
    #[error("invalid read range: offset {offset} + length {len} exceeds buffer of {capacity}")]
    InvalidRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    /// A blocked read exceeded its deadline
    #[error("read timed out")]
    TimedOut,
    /// The underlying channel failed while delivering data
    #[error("producer failed ({kind:?}): {message}")]
    Producer { kind: io::ErrorKind, message: String },
}

impl StreamError {
    /// Build a producer failure from an I/O error
    pub fn producer(err: &io::Error) -> Self {
        Self::Producer {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Whether this error is a caller bug rather than an operational failure
    pub fn is_usage_violation(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::AppendAfterEof | Self::EofAlreadySignaled | Self::InvalidRange { .. }
        )
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::Closed => io::ErrorKind::NotConnected,
            StreamError::AppendAfterEof | StreamError::EofAlreadySignaled => {
                io::ErrorKind::InvalidInput
            }
            StreamError::InvalidRange { .. } => io::ErrorKind::InvalidInput,
            StreamError::TimedOut => io::ErrorKind::TimedOut,
            StreamError::Producer { kind, .. } => *kind,
        };
        io::Error::new(kind, err)
    }
}

/// Convenience Result type for stream bridge operations
pub type Result<T> = std::result::Result<T, StreamError>;
