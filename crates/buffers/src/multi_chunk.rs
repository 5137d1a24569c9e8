//! Buffer spanning a sequence of chunks.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::byte_buffer::ByteBuffer;
use crate::chunk::Chunk;
use crate::chunk_source::ChunkSource;
use crate::error::check_range;
use crate::single_chunk::SingleChunkBuffer;
use crate::BufferError;

/// A [`ByteBuffer`] over an ordered list of chunks of varying sizes.
///
/// Positions are mapped to chunks through the cumulative chunk boundaries.
/// The most recently used chunk index is cached, so sequential access costs
/// O(1) amortized instead of a search per byte.
#[derive(Default)]
pub struct MultiChunkBuffer {
    chunks: Vec<Chunk>,
    /// Absolute start offset of each chunk.
    starts: Vec<usize>,
    total: usize,
    origin: usize,
    length: usize,
    read_only: bool,
    disposed: bool,
    source: Option<Arc<dyn ChunkSource>>,
    last_index: AtomicUsize,
}

impl MultiChunkBuffer {
    /// Empty growable buffer drawing chunks from `source`.
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    pub fn with_source<S: ChunkSource + 'static>(source: S) -> Self {
        Self::new(Arc::new(source))
    }

    /// Buffer over existing chunks. It cannot grow past their combined size.
    pub fn from_chunks(chunks: Vec<Chunk>, length: usize, read_only: bool) -> Result<Self, BufferError> {
        let mut buffer = Self::default();
        for chunk in chunks {
            buffer.push_chunk(chunk);
        }
        if length > buffer.total {
            return Err(BufferError::InsufficientCapacity {
                requested: length,
                capacity: buffer.total,
            });
        }
        buffer.length = length;
        if read_only {
            buffer.make_read_only();
        }
        Ok(buffer)
    }

    pub(crate) fn from_forks(chunks: Vec<Chunk>, origin: usize, length: usize) -> Self {
        let mut buffer = Self::default();
        for chunk in chunks {
            buffer.push_chunk(chunk);
        }
        buffer.origin = origin;
        buffer.length = length;
        buffer.read_only = true;
        buffer
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn push_chunk(&mut self, chunk: Chunk) {
        self.starts.push(self.total);
        self.total += chunk.len();
        self.chunks.push(chunk);
    }

    fn check_live(&self) -> Result<(), BufferError> {
        if self.disposed {
            return Err(BufferError::Disposed);
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<(), BufferError> {
        self.check_live()?;
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        Ok(())
    }

    /// Maps an absolute offset to `(chunk index, offset within chunk)`.
    /// Requires at least one chunk.
    fn locate(&self, absolute: usize) -> (usize, usize) {
        let last = self.chunks.len() - 1;
        let mut index = self.last_index.load(Ordering::Relaxed).min(last);
        while index > 0 && absolute < self.starts[index] {
            index -= 1;
        }
        while index < last && absolute >= self.starts[index + 1] {
            index += 1;
        }
        self.last_index.store(index, Ordering::Relaxed);
        (index, absolute - self.starts[index])
    }

    fn window(&self, position: usize) -> &[u8] {
        if self.chunks.is_empty() {
            return &[];
        }
        let absolute = self.origin + position;
        let (index, offset) = self.locate(absolute);
        let chunk = self.chunks[index].as_slice();
        let available = self.length - position;
        let end = chunk.len().min(offset + available);
        &chunk[offset.min(end)..end]
    }

    fn window_mut(&mut self, position: usize) -> Result<&mut [u8], BufferError> {
        if self.chunks.is_empty() {
            return Ok(&mut []);
        }
        let absolute = self.origin + position;
        let available = self.length - position;
        let (index, offset) = self.locate(absolute);
        let chunk = self.chunks[index].as_mut_slice()?;
        let end = chunk.len().min(offset + available);
        Ok(&mut chunk[offset.min(end)..end])
    }
}

impl ByteBuffer for MultiChunkBuffer {
    fn capacity(&self) -> usize {
        if self.disposed {
            0
        } else if self.read_only {
            self.length
        } else {
            self.total - self.origin
        }
    }

    fn len(&self) -> usize {
        self.length
    }

    fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        self.check_writable()?;
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
        for chunk in &mut self.chunks {
            chunk.freeze();
        }
    }

    fn get_byte(&self, position: usize) -> Result<u8, BufferError> {
        self.check_live()?;
        if position >= self.length {
            return Err(BufferError::OutOfRange {
                position,
                length: self.length,
            });
        }
        Ok(self.window(position)[0])
    }

    fn get_bytes(&self, position: usize, destination: &mut [u8]) -> Result<(), BufferError> {
        self.check_live()?;
        check_range(position, destination.len(), self.length)?;
        let mut copied = 0;
        while copied < destination.len() {
            let window = self.window(position + copied);
            let count = window.len().min(destination.len() - copied);
            destination[copied..copied + count].copy_from_slice(&window[..count]);
            copied += count;
        }
        Ok(())
    }

    fn set_byte(&mut self, position: usize, value: u8) -> Result<(), BufferError> {
        self.check_writable()?;
        if position >= self.length {
            return Err(BufferError::OutOfRange {
                position,
                length: self.length,
            });
        }
        self.window_mut(position)?[0] = value;
        Ok(())
    }

    fn set_bytes(&mut self, position: usize, source: &[u8]) -> Result<(), BufferError> {
        self.check_writable()?;
        check_range(position, source.len(), self.length)?;
        let mut written = 0;
        while written < source.len() {
            let window = self.window_mut(position + written)?;
            let count = window.len().min(source.len() - written);
            window[..count].copy_from_slice(&source[written..written + count]);
            written += count;
        }
        Ok(())
    }

    fn clear(&mut self, position: usize, count: usize) -> Result<(), BufferError> {
        self.check_writable()?;
        check_range(position, count, self.length)?;
        let mut cleared = 0;
        while cleared < count {
            let window = self.window_mut(position + cleared)?;
            let n = window.len().min(count - cleared);
            window[..n].fill(0);
            cleared += n;
        }
        Ok(())
    }

    fn access_backing_bytes(&self, position: usize) -> Result<&[u8], BufferError> {
        self.check_live()?;
        if position > self.length {
            return Err(BufferError::OutOfRange {
                position,
                length: self.length,
            });
        }
        Ok(self.window(position))
    }

    fn access_backing_bytes_mut(&mut self, position: usize) -> Result<&mut [u8], BufferError> {
        self.check_writable()?;
        if position > self.length {
            return Err(BufferError::OutOfRange {
                position,
                length: self.length,
            });
        }
        self.window_mut(position)
    }

    fn ensure_capacity(&mut self, minimum_capacity: usize) -> Result<(), BufferError> {
        self.check_writable()?;
        let required = self
            .origin
            .checked_add(minimum_capacity)
            .ok_or(BufferError::InvalidArgument("capacity overflow"))?;
        if required <= self.total {
            return Ok(());
        }
        let source = self.source.clone().ok_or(BufferError::Unsupported)?;
        while self.total < required {
            let chunk = source.get_chunk(required - self.total)?;
            if chunk.is_empty() {
                return Err(BufferError::InvalidArgument("chunk source returned an empty chunk"));
            }
            self.push_chunk(chunk);
        }
        Ok(())
    }

    fn get_slice(&self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        self.check_live()?;
        if !self.read_only {
            return Err(BufferError::NotReadOnly);
        }
        check_range(position, length, self.length)?;
        if length == 0 {
            return Ok(Box::new(SingleChunkBuffer::empty_read_only()));
        }
        let (first, first_offset) = self.locate(self.origin + position);
        let (last, _) = self.locate(self.origin + position + length - 1);
        if first == last {
            let fork = self.chunks[first].fork()?;
            return Ok(Box::new(SingleChunkBuffer::from_fork(fork, first_offset, length)));
        }
        let forks = self.chunks[first..=last]
            .iter()
            .map(Chunk::fork)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(MultiChunkBuffer::from_forks(forks, first_offset, length)))
    }

    fn dispose(&mut self) {
        self.chunks.clear();
        self.starts.clear();
        self.total = 0;
        self.length = 0;
        self.disposed = true;
    }
}

impl fmt::Debug for MultiChunkBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiChunkBuffer")
            .field("chunks", &self.chunks.len())
            .field("origin", &self.origin)
            .field("length", &self.length)
            .field("capacity", &self.capacity())
            .field("read_only", &self.read_only)
            .field("growable", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnpooledChunkSource;

    fn chunks(sizes: &[usize]) -> Vec<Chunk> {
        sizes.iter().map(|&n| Chunk::zeroed(n)).collect()
    }

    fn filled(sizes: &[usize]) -> MultiChunkBuffer {
        let total = sizes.iter().sum();
        let mut buffer = MultiChunkBuffer::from_chunks(chunks(sizes), total, false).unwrap();
        let data: Vec<u8> = (0..total).map(|i| i as u8).collect();
        buffer.set_bytes(0, &data).unwrap();
        buffer
    }

    #[test]
    fn test_bytes_across_chunk_boundaries() {
        let buffer = filled(&[3, 1, 5]);
        let mut out = [0u8; 9];
        buffer.get_bytes(0, &mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buffer.get_byte(3).unwrap(), 3);
        assert_eq!(buffer.get_byte(8).unwrap(), 8);
        // Backwards after forwards exercises the cached index.
        assert_eq!(buffer.get_byte(0).unwrap(), 0);
    }

    #[test]
    fn test_backing_window_stops_at_chunk_boundary() {
        let buffer = filled(&[4, 4]);
        assert_eq!(buffer.access_backing_bytes(1).unwrap(), &[1, 2, 3]);
        assert_eq!(buffer.access_backing_bytes(4).unwrap(), &[4, 5, 6, 7]);
        assert!(buffer.access_backing_bytes(8).unwrap().is_empty());
    }

    #[test]
    fn test_ensure_capacity_grows_from_source() {
        let mut buffer = MultiChunkBuffer::with_source(UnpooledChunkSource);
        assert_eq!(buffer.capacity(), 0);
        buffer.ensure_capacity(10).unwrap();
        assert!(buffer.capacity() >= 10);
        buffer.set_len(10).unwrap();
        buffer.set_bytes(0, b"0123456789").unwrap();
        buffer.ensure_capacity(25).unwrap();
        assert!(buffer.capacity() >= 25);
        assert_eq!(buffer.chunk_count(), 2);
        assert_eq!(buffer.to_vec().unwrap(), b"0123456789");
    }

    #[test]
    fn test_ensure_capacity_without_source() {
        let mut buffer = MultiChunkBuffer::from_chunks(chunks(&[4]), 0, false).unwrap();
        assert_eq!(buffer.ensure_capacity(5).unwrap_err(), BufferError::Unsupported);
    }

    #[test]
    fn test_slice_spanning_chunks() {
        let mut buffer = filled(&[3, 3, 3]);
        assert_eq!(buffer.get_slice(0, 1).unwrap_err(), BufferError::NotReadOnly);
        buffer.make_read_only();
        let slice = buffer.get_slice(2, 5).unwrap();
        assert_eq!(slice.to_vec().unwrap(), [2, 3, 4, 5, 6]);
        let inner = slice.get_slice(1, 3).unwrap();
        assert_eq!(inner.to_vec().unwrap(), [3, 4, 5]);
    }

    #[test]
    fn test_slice_within_one_chunk() {
        let mut buffer = filled(&[4, 4]);
        buffer.make_read_only();
        let slice = buffer.get_slice(5, 2).unwrap();
        assert_eq!(slice.to_vec().unwrap(), [5, 6]);
        assert!(buffer.get_slice(8, 0).unwrap().is_empty());
    }

    #[test]
    fn test_clear_spanning_chunks() {
        let mut buffer = filled(&[2, 2, 2]);
        buffer.clear(1, 4).unwrap();
        assert_eq!(buffer.to_vec().unwrap(), [0, 0, 0, 0, 0, 5]);
    }

    #[test]
    fn test_disposed_buffer() {
        let mut buffer = filled(&[2]);
        buffer.dispose();
        assert_eq!(buffer.get_byte(0).unwrap_err(), BufferError::Disposed);
        assert_eq!(buffer.ensure_capacity(1).unwrap_err(), BufferError::Disposed);
    }
}
