//! Behavior matrix for byte buffers and the streams built on them.

use bson_io_buffers::factory::{create_buffer, load_document};
use bson_io_buffers::{
    BufferError, ByteBuffer, ByteBufferStream, ByteSink, ByteSource, Chunk, ChunkPool,
    DirectBufferAccess, MultiChunkBuffer, OutputBufferChunkSource, SingleChunkBuffer,
    UnpooledChunkSource,
};
use proptest::prelude::*;

fn multi(sizes: &[usize]) -> MultiChunkBuffer {
    let chunks = sizes.iter().map(|&n| Chunk::zeroed(n)).collect();
    MultiChunkBuffer::from_chunks(chunks, 0, false).unwrap()
}

// ---------------------------------------------------------------------------
// Capacity and length
// ---------------------------------------------------------------------------

#[test]
fn growable_buffer_reports_source_chunks() {
    let source = OutputBufferChunkSource::with_limits(UnpooledChunkSource, 8, 16, 64).unwrap();
    let mut buffer = MultiChunkBuffer::with_source(source);
    buffer.ensure_capacity(30).unwrap();
    // 8 unpooled, then 16 and 32 from the base.
    assert_eq!(buffer.capacity(), 56);
    assert_eq!(buffer.chunk_count(), 3);
}

#[test]
fn set_len_beyond_capacity_fails() {
    let mut buffer = multi(&[4, 4]);
    buffer.set_len(8).unwrap();
    assert!(matches!(
        buffer.set_len(9),
        Err(BufferError::InsufficientCapacity { requested: 9, capacity: 8 })
    ));
}

#[test]
fn read_only_buffers_reject_mutation() {
    let mut buffer = multi(&[4]);
    buffer.set_len(4).unwrap();
    buffer.make_read_only();
    assert_eq!(buffer.capacity(), 4);
    assert_eq!(buffer.set_bytes(0, b"a").unwrap_err(), BufferError::ReadOnly);
    assert_eq!(buffer.clear(0, 1).unwrap_err(), BufferError::ReadOnly);
    assert_eq!(buffer.ensure_capacity(1).unwrap_err(), BufferError::ReadOnly);
    assert_eq!(buffer.access_backing_bytes_mut(0).unwrap_err(), BufferError::ReadOnly);
}

#[test]
fn out_of_range_access() {
    let mut buffer = multi(&[4]);
    buffer.set_len(2).unwrap();
    assert!(matches!(
        buffer.get_byte(2),
        Err(BufferError::OutOfRange { position: 2, length: 2 })
    ));
    let mut out = [0u8; 3];
    assert!(matches!(
        buffer.get_bytes(0, &mut out),
        Err(BufferError::RangeOutOfBounds { .. })
    ));
}

// ---------------------------------------------------------------------------
// Slicing
// ---------------------------------------------------------------------------

#[test]
fn slices_outlive_their_parent() {
    let pool = ChunkPool::new(16, 4);
    let mut buffer = create_buffer(&pool, 10).unwrap();
    buffer.set_len(10).unwrap();
    buffer.set_bytes(0, b"0123456789").unwrap();
    buffer.make_read_only();
    let slice = buffer.get_slice(4, 4).unwrap();
    drop(buffer);
    assert_eq!(slice.to_vec().unwrap(), b"4567");
    // The middle chunk is still shared with the slice.
    assert_eq!(pool.pooled_chunks(), 2);

    // Recycled chunks can be rewritten without touching the slice.
    let mut reused = create_buffer(&pool, 8).unwrap();
    assert_eq!(pool.pooled_chunks(), 0);
    reused.set_len(8).unwrap();
    reused.set_bytes(0, b"XXXXXXXX").unwrap();
    assert_eq!(slice.to_vec().unwrap(), b"4567");

    drop(slice);
    assert_eq!(pool.pooled_chunks(), 1);
    drop(reused);
    assert_eq!(pool.pooled_chunks(), 3);
}

#[test]
fn slice_range_checked() {
    let buffer = SingleChunkBuffer::from_slice(b"abc", true);
    assert!(buffer.get_slice(2, 2).is_err());
    assert!(buffer.get_slice(4, 0).is_err());
    assert!(buffer.get_slice(3, 0).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[test]
fn stream_writes_span_chunks() {
    let pool = ChunkPool::new(16, 3);
    let mut stream = ByteBufferStream::new(MultiChunkBuffer::with_source(pool));
    ByteSink::write_all(&mut stream, b"abcdefgh").unwrap();
    assert_eq!(stream.buffer().chunk_count(), 3);
    stream.set_position(2);
    assert_eq!(stream.readable_window(), b"c");
    stream.set_position(3);
    assert_eq!(stream.readable_window(), b"def");
    let mut out = [0u8; 6];
    stream.set_position(1);
    stream.read_into(&mut out).unwrap();
    assert_eq!(&out, b"bcdefg");
}

#[test]
fn writable_window_stops_at_chunk_boundary() {
    let pool = ChunkPool::new(16, 4);
    let mut stream = ByteBufferStream::new(MultiChunkBuffer::with_source(pool));
    stream.set_position(2);
    let window = stream.writable_window(5).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(stream.len(), 7);
}

#[test]
fn write_buffer_appends_every_chunk() {
    let mut source = multi(&[2, 2, 2]);
    source.set_len(5).unwrap();
    source.set_bytes(0, b"hello").unwrap();
    let mut sink = ByteBufferStream::new(MultiChunkBuffer::with_source(UnpooledChunkSource));
    sink.write_buffer(&source).unwrap();
    assert_eq!(sink.buffer().to_vec().unwrap(), b"hello");
}

#[test]
fn read_only_stream_slices_share_storage() {
    let mut input = &[6u8, 0, 0, 0, 0xAA, 0][..];
    let buffer = load_document(&mut input, &UnpooledChunkSource, 64).unwrap();
    let mut stream = ByteBufferStream::new(buffer);
    let slice = ByteSource::slice(&mut stream, 4, 2).unwrap();
    assert_eq!(slice.to_vec().unwrap(), [0xAA, 0]);
    assert_eq!(stream.position(), 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn stream_matches_vec(
        chunk_size in 1usize..16,
        writes in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..20), 0..10),
    ) {
        let pool = ChunkPool::new(64, chunk_size);
        let mut stream = ByteBufferStream::new(MultiChunkBuffer::with_source(pool));
        let mut expected = Vec::new();
        for write in &writes {
            ByteSink::write_all(&mut stream, write).unwrap();
            expected.extend_from_slice(write);
        }
        prop_assert_eq!(stream.buffer().to_vec().unwrap(), expected.clone());

        stream.buffer_mut().make_read_only();
        if !expected.is_empty() {
            let start = expected.len() / 3;
            let len = expected.len() - start;
            let slice = stream.get_slice(start, len).unwrap();
            prop_assert_eq!(slice.to_vec().unwrap(), expected[start..].to_vec());
        }
    }
}
