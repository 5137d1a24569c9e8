//! Buffer backed by a single chunk.

use crate::byte_buffer::ByteBuffer;
use crate::chunk::Chunk;
use crate::error::check_range;
use crate::BufferError;

/// A [`ByteBuffer`] over one contiguous chunk.
///
/// The capacity is fixed at construction; [`ensure_capacity`](ByteBuffer::ensure_capacity)
/// fails with [`BufferError::Unsupported`] when asked for more.
#[derive(Debug)]
pub struct SingleChunkBuffer {
    chunk: Option<Chunk>,
    origin: usize,
    length: usize,
    read_only: bool,
}

impl SingleChunkBuffer {
    pub fn new(mut chunk: Chunk, length: usize, read_only: bool) -> Result<Self, BufferError> {
        if length > chunk.len() {
            return Err(BufferError::InsufficientCapacity {
                requested: length,
                capacity: chunk.len(),
            });
        }
        if read_only {
            chunk.freeze();
        }
        Ok(Self {
            chunk: Some(chunk),
            origin: 0,
            length,
            read_only,
        })
    }

    /// Buffer over a copy of `data`, with length equal to `data.len()`.
    pub fn from_slice(data: &[u8], read_only: bool) -> Self {
        let mut chunk = Chunk::from_slice(data);
        if read_only {
            chunk.freeze();
        }
        Self {
            chunk: Some(chunk),
            origin: 0,
            length: data.len(),
            read_only,
        }
    }

    pub(crate) fn from_fork(chunk: Chunk, origin: usize, length: usize) -> Self {
        Self {
            chunk: Some(chunk),
            origin,
            length,
            read_only: true,
        }
    }

    pub(crate) fn empty_read_only() -> Self {
        Self::from_slice(&[], true)
    }

    fn chunk(&self) -> Result<&Chunk, BufferError> {
        self.chunk.as_ref().ok_or(BufferError::Disposed)
    }

    fn writable(&mut self) -> Result<&mut [u8], BufferError> {
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        let origin = self.origin;
        let chunk = self.chunk.as_mut().ok_or(BufferError::Disposed)?;
        Ok(&mut chunk.as_mut_slice()?[origin..])
    }

    fn readable(&self) -> Result<&[u8], BufferError> {
        let chunk = self.chunk()?;
        Ok(&chunk.as_slice()[self.origin..self.origin + self.length])
    }
}

impl ByteBuffer for SingleChunkBuffer {
    fn capacity(&self) -> usize {
        match (&self.chunk, self.read_only) {
            (None, _) => 0,
            (Some(_), true) => self.length,
            (Some(chunk), false) => chunk.len() - self.origin,
        }
    }

    fn len(&self) -> usize {
        self.length
    }

    fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        self.chunk()?;
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        let capacity = self.capacity();
        if len > capacity {
            return Err(BufferError::InsufficientCapacity {
                requested: len,
                capacity,
            });
        }
        self.length = len;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn make_read_only(&mut self) {
        self.read_only = true;
        if let Some(chunk) = self.chunk.as_mut() {
            chunk.freeze();
        }
    }

    fn get_byte(&self, position: usize) -> Result<u8, BufferError> {
        let bytes = self.readable()?;
        bytes.get(position).copied().ok_or(BufferError::OutOfRange {
            position,
            length: self.length,
        })
    }

    fn get_bytes(&self, position: usize, destination: &mut [u8]) -> Result<(), BufferError> {
        let bytes = self.readable()?;
        check_range(position, destination.len(), self.length)?;
        destination.copy_from_slice(&bytes[position..position + destination.len()]);
        Ok(())
    }

    fn set_byte(&mut self, position: usize, value: u8) -> Result<(), BufferError> {
        let length = self.length;
        let bytes = self.writable()?;
        if position >= length {
            return Err(BufferError::OutOfRange { position, length });
        }
        bytes[position] = value;
        Ok(())
    }

    fn set_bytes(&mut self, position: usize, source: &[u8]) -> Result<(), BufferError> {
        let length = self.length;
        let bytes = self.writable()?;
        check_range(position, source.len(), length)?;
        bytes[position..position + source.len()].copy_from_slice(source);
        Ok(())
    }

    fn clear(&mut self, position: usize, count: usize) -> Result<(), BufferError> {
        let length = self.length;
        let bytes = self.writable()?;
        check_range(position, count, length)?;
        bytes[position..position + count].fill(0);
        Ok(())
    }

    fn access_backing_bytes(&self, position: usize) -> Result<&[u8], BufferError> {
        let bytes = self.readable()?;
        if position > self.length {
            return Err(BufferError::OutOfRange {
                position,
                length: self.length,
            });
        }
        Ok(&bytes[position..])
    }

    fn access_backing_bytes_mut(&mut self, position: usize) -> Result<&mut [u8], BufferError> {
        let length = self.length;
        let bytes = self.writable()?;
        if position > length {
            return Err(BufferError::OutOfRange { position, length });
        }
        Ok(&mut bytes[position..length])
    }

    fn ensure_capacity(&mut self, minimum_capacity: usize) -> Result<(), BufferError> {
        self.chunk()?;
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        if minimum_capacity > self.capacity() {
            return Err(BufferError::Unsupported);
        }
        Ok(())
    }

    fn get_slice(&self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        let chunk = self.chunk()?;
        if !self.read_only {
            return Err(BufferError::NotReadOnly);
        }
        check_range(position, length, self.length)?;
        let fork = chunk.fork()?;
        Ok(Box::new(SingleChunkBuffer::from_fork(
            fork,
            self.origin + position,
            length,
        )))
    }

    fn dispose(&mut self) {
        self.chunk = None;
        self.length = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writable(capacity: usize) -> SingleChunkBuffer {
        SingleChunkBuffer::new(Chunk::zeroed(capacity), 0, false).unwrap()
    }

    #[test]
    fn test_set_len_within_capacity() {
        let mut buffer = writable(8);
        assert_eq!(buffer.capacity(), 8);
        buffer.set_len(8).unwrap();
        assert!(matches!(
            buffer.set_len(9),
            Err(BufferError::InsufficientCapacity { requested: 9, capacity: 8 })
        ));
    }

    #[test]
    fn test_ensure_capacity_without_source() {
        let mut buffer = writable(8);
        buffer.ensure_capacity(8).unwrap();
        assert_eq!(buffer.ensure_capacity(9).unwrap_err(), BufferError::Unsupported);
    }

    #[test]
    fn test_read_only_capacity_is_length() {
        let mut buffer = writable(8);
        buffer.set_len(3).unwrap();
        buffer.set_bytes(0, b"abc").unwrap();
        buffer.make_read_only();
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.set_byte(0, 1).unwrap_err(), BufferError::ReadOnly);
        assert_eq!(buffer.set_len(2).unwrap_err(), BufferError::ReadOnly);
    }

    #[test]
    fn test_slice_requires_read_only() {
        let buffer = SingleChunkBuffer::from_slice(b"abcdef", false);
        assert_eq!(buffer.get_slice(0, 2).unwrap_err(), BufferError::NotReadOnly);
    }

    #[test]
    fn test_slice_of_slice() {
        let buffer = SingleChunkBuffer::from_slice(b"abcdef", true);
        let slice = buffer.get_slice(1, 4).unwrap();
        assert_eq!(slice.to_vec().unwrap(), b"bcde");
        let inner = slice.get_slice(2, 2).unwrap();
        drop(slice);
        drop(buffer);
        assert_eq!(inner.to_vec().unwrap(), b"de");
    }

    #[test]
    fn test_backing_bytes_bounded_by_length() {
        let mut buffer = writable(8);
        buffer.set_len(5).unwrap();
        assert_eq!(buffer.access_backing_bytes(2).unwrap().len(), 3);
        assert_eq!(buffer.access_backing_bytes_mut(5).unwrap().len(), 0);
        assert!(buffer.access_backing_bytes(6).is_err());
    }

    #[test]
    fn test_disposed_buffer() {
        let mut buffer = writable(4);
        buffer.dispose();
        assert_eq!(buffer.get_byte(0).unwrap_err(), BufferError::Disposed);
        assert_eq!(buffer.set_len(0).unwrap_err(), BufferError::Disposed);
    }
}
