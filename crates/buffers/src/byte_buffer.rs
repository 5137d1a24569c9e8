//! The `ByteBuffer` abstraction.

use std::io;

use crate::BufferError;

/// A logical byte array with a length and a physical capacity.
///
/// Writable buffers expose `capacity` bytes of storage and a logical
/// `len`. Once made read-only the capacity collapses to the length, all
/// mutation fails and [`get_slice`](Self::get_slice) becomes available.
pub trait ByteBuffer: Send + Sync {
    fn capacity(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the logical length. Fails on read-only buffers or when `len`
    /// exceeds the capacity.
    fn set_len(&mut self, len: usize) -> Result<(), BufferError>;

    fn is_read_only(&self) -> bool;

    fn make_read_only(&mut self);

    fn get_byte(&self, position: usize) -> Result<u8, BufferError>;

    /// Copies `destination.len()` bytes starting at `position`.
    fn get_bytes(&self, position: usize, destination: &mut [u8]) -> Result<(), BufferError>;

    fn set_byte(&mut self, position: usize, value: u8) -> Result<(), BufferError>;

    fn set_bytes(&mut self, position: usize, source: &[u8]) -> Result<(), BufferError>;

    /// Zeroes `count` bytes starting at `position`.
    fn clear(&mut self, position: usize, count: usize) -> Result<(), BufferError>;

    /// Contiguous view of the bytes starting at `position`.
    ///
    /// The view ends at the first chunk boundary or at the logical length,
    /// whichever comes first. `position == len()` yields an empty view.
    fn access_backing_bytes(&self, position: usize) -> Result<&[u8], BufferError>;

    /// Mutable counterpart of [`access_backing_bytes`](Self::access_backing_bytes).
    fn access_backing_bytes_mut(&mut self, position: usize) -> Result<&mut [u8], BufferError>;

    /// Grows the capacity to at least `minimum_capacity`.
    fn ensure_capacity(&mut self, minimum_capacity: usize) -> Result<(), BufferError>;

    /// Zero-copy view of `length` bytes at `position`.
    ///
    /// Only available on read-only buffers; the slice shares chunk storage
    /// with this buffer and remains valid after this buffer is dropped.
    fn get_slice(&self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError>;

    /// Releases the chunks held by this buffer. Later access fails with
    /// [`BufferError::Disposed`].
    fn dispose(&mut self);

    /// Writes the logical contents to `writer`.
    fn write_to(&self, writer: &mut dyn io::Write) -> Result<(), BufferError> {
        let mut position = 0;
        while position < self.len() {
            let window = self.access_backing_bytes(position)?;
            if window.is_empty() {
                return Err(BufferError::EndOfStream);
            }
            writer.write_all(window)?;
            position += window.len();
        }
        Ok(())
    }

    /// Copies the logical contents into a new vector.
    fn to_vec(&self) -> Result<Vec<u8>, BufferError> {
        let mut out = Vec::with_capacity(self.len());
        self.write_to(&mut out)?;
        Ok(out)
    }
}

impl<B: ByteBuffer + ?Sized> ByteBuffer for Box<B> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        (**self).set_len(len)
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }

    fn make_read_only(&mut self) {
        (**self).make_read_only()
    }

    fn get_byte(&self, position: usize) -> Result<u8, BufferError> {
        (**self).get_byte(position)
    }

    fn get_bytes(&self, position: usize, destination: &mut [u8]) -> Result<(), BufferError> {
        (**self).get_bytes(position, destination)
    }

    fn set_byte(&mut self, position: usize, value: u8) -> Result<(), BufferError> {
        (**self).set_byte(position, value)
    }

    fn set_bytes(&mut self, position: usize, source: &[u8]) -> Result<(), BufferError> {
        (**self).set_bytes(position, source)
    }

    fn clear(&mut self, position: usize, count: usize) -> Result<(), BufferError> {
        (**self).clear(position, count)
    }

    fn access_backing_bytes(&self, position: usize) -> Result<&[u8], BufferError> {
        (**self).access_backing_bytes(position)
    }

    fn access_backing_bytes_mut(&mut self, position: usize) -> Result<&mut [u8], BufferError> {
        (**self).access_backing_bytes_mut(position)
    }

    fn ensure_capacity(&mut self, minimum_capacity: usize) -> Result<(), BufferError> {
        (**self).ensure_capacity(minimum_capacity)
    }

    fn get_slice(&self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        (**self).get_slice(position, length)
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }
}

impl std::fmt::Debug for dyn ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}
