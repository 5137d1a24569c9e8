//! Buffer construction helpers.

use std::io::Read;

use crate::byte_buffer::ByteBuffer;
use crate::chunk_source::ChunkSource;
use crate::multi_chunk::MultiChunkBuffer;
use crate::single_chunk::SingleChunkBuffer;
use crate::BufferError;

/// Creates a writable, empty buffer with at least `minimum_capacity` bytes.
///
/// A single chunk buffer is returned when the first chunk is large enough,
/// otherwise a multi chunk buffer holding as many chunks as needed. Neither
/// can grow beyond the capacity obtained here.
pub fn create_buffer<S: ChunkSource + ?Sized>(
    source: &S,
    minimum_capacity: usize,
) -> Result<Box<dyn ByteBuffer>, BufferError> {
    if minimum_capacity == 0 {
        return Err(BufferError::InvalidArgument("minimum capacity must be positive"));
    }
    let mut chunks = Vec::new();
    let mut total = 0;
    while total < minimum_capacity {
        let chunk = source.get_chunk(minimum_capacity - total)?;
        if chunk.is_empty() {
            return Err(BufferError::InvalidArgument("chunk source returned an empty chunk"));
        }
        total += chunk.len();
        chunks.push(chunk);
    }
    if chunks.len() == 1 {
        if let Some(chunk) = chunks.pop() {
            return Ok(Box::new(SingleChunkBuffer::new(chunk, 0, false)?));
        }
    }
    Ok(Box::new(MultiChunkBuffer::from_chunks(chunks, 0, false)?))
}

/// Reads one length-prefixed BSON document from `reader` into a new
/// read-only buffer.
///
/// The first four bytes are the little-endian document length, which counts
/// itself and must be at least 5. Lengths above `max_document_size` are
/// rejected before any chunk is requested from `source`.
pub fn load_document<R: Read + ?Sized, S: ChunkSource + ?Sized>(
    reader: &mut R,
    source: &S,
    max_document_size: usize,
) -> Result<Box<dyn ByteBuffer>, BufferError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let length = i32::from_le_bytes(prefix);
    if length < 5 {
        return Err(BufferError::InvalidArgument(
            "document length prefix must be at least 5",
        ));
    }
    let length = length as usize;
    if length > max_document_size {
        return Err(BufferError::DocumentTooLarge {
            length,
            max: max_document_size,
        });
    }
    let mut buffer = create_buffer(source, length)?;
    buffer.set_len(length)?;
    buffer.set_bytes(0, &prefix)?;
    let mut position = prefix.len();
    while position < length {
        let window = buffer.access_backing_bytes_mut(position)?;
        reader.read_exact(window)?;
        position += window.len();
    }
    buffer.make_read_only();
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{ChunkPool, UnpooledChunkSource};

    #[test]
    fn test_create_single_chunk() {
        let buffer = create_buffer(&UnpooledChunkSource, 100).unwrap();
        assert_eq!(buffer.capacity(), 100);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_create_spans_pool_chunks() {
        let pool = ChunkPool::new(8, 16);
        let buffer = create_buffer(&pool, 40).unwrap();
        assert_eq!(buffer.capacity(), 48);
    }

    #[test]
    fn test_load_document() {
        let pool = ChunkPool::new(8, 4);
        let bytes = [0x0D, 0, 0, 0, 0x08, b'a', 0, 1, 0x0A, b'b', 0, 0, 0];
        let mut input = &bytes[..];
        let buffer = load_document(&mut input, &pool, 1024).unwrap();
        assert!(buffer.is_read_only());
        assert_eq!(buffer.to_vec().unwrap(), bytes);
    }

    #[test]
    fn test_load_document_rejects_short_prefix() {
        let mut input = &[4u8, 0, 0, 0][..];
        assert!(matches!(
            load_document(&mut input, &UnpooledChunkSource, 1024),
            Err(BufferError::InvalidArgument(_))
        ));
    }

    #[derive(Default)]
    struct CountingSource {
        requested: AtomicUsize,
    }

    impl ChunkSource for CountingSource {
        fn get_chunk(&self, requested: usize) -> Result<crate::Chunk, BufferError> {
            self.requested.fetch_add(requested, Ordering::Relaxed);
            UnpooledChunkSource.get_chunk(requested)
        }
    }

    #[test]
    fn test_load_document_rejects_oversized_prefix() {
        let source = CountingSource::default();
        let mut input = &[0xFFu8, 0xFF, 0xFF, 0x7F][..];
        assert_eq!(
            load_document(&mut input, &source, 16 * 1024 * 1024).unwrap_err(),
            BufferError::DocumentTooLarge {
                length: i32::MAX as usize,
                max: 16 * 1024 * 1024,
            }
        );
        assert_eq!(source.requested.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_load_document_at_maximum() {
        let bytes = [6u8, 0, 0, 0, 0xAA, 0];
        let mut input = &bytes[..];
        let buffer = load_document(&mut input, &UnpooledChunkSource, 6).unwrap();
        assert_eq!(buffer.to_vec().unwrap(), bytes);
    }

    #[test]
    fn test_load_document_truncated() {
        let mut input = &[10u8, 0, 0, 0, 1, 2][..];
        assert_eq!(
            load_document(&mut input, &UnpooledChunkSource, 1024).unwrap_err(),
            BufferError::EndOfStream
        );
    }
}
