//! Buffer error type.

use std::io;

use thiserror::Error;

/// Error type for buffer, chunk and stream operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A position lies outside of the buffer.
    #[error("position {position} is outside of the buffer (length {length})")]
    OutOfRange { position: usize, length: usize },
    /// A range starting inside the buffer extends past its end.
    #[error("{count} bytes at position {position} extend past the end of the buffer (length {length})")]
    RangeOutOfBounds {
        position: usize,
        count: usize,
        length: usize,
    },
    /// A length larger than the physical capacity was requested.
    #[error("length {requested} exceeds capacity {capacity}")]
    InsufficientCapacity { requested: usize, capacity: usize },
    /// Attempted to mutate read-only memory.
    #[error("buffer is read only")]
    ReadOnly,
    /// Slicing or forking requires read-only memory.
    #[error("buffer is not read only")]
    NotReadOnly,
    /// The buffer cannot grow because it has no chunk source.
    #[error("capacity cannot be expanded because the buffer was created without a chunk source")]
    Unsupported,
    /// The buffer has been disposed.
    #[error("buffer has been disposed")]
    Disposed,
    /// Attempted to read past the end of the data.
    #[error("unexpected end of stream")]
    EndOfStream,
    /// A declared document length exceeds the configured maximum.
    #[error("document length {length} exceeds the maximum of {max}")]
    DocumentTooLarge { length: usize, max: usize },
    /// The scratch buffer is already leased by an enclosing scope.
    #[error("scratch buffer is already in use")]
    ScratchInUse,
    /// An argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// An underlying I/O operation failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<io::Error> for BufferError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => BufferError::EndOfStream,
            _ => BufferError::Io(err.to_string()),
        }
    }
}

/// Verifies that `count` bytes starting at `position` lie within `length`.
pub(crate) fn check_range(position: usize, count: usize, length: usize) -> Result<(), BufferError> {
    if position > length {
        return Err(BufferError::OutOfRange { position, length });
    }
    match position.checked_add(count) {
        Some(end) if end <= length => Ok(()),
        _ => Err(BufferError::RangeOutOfBounds {
            position,
            count,
            length,
        }),
    }
}
