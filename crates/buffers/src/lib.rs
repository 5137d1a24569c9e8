//! Byte buffer memory layer for the bson-io codec.
//!
//! This crate provides the chunked storage that BSON readers and writers
//! operate on: reference-counted chunks, pooled and unpooled chunk sources,
//! growable and fixed byte buffers, and the byte source/sink traits the
//! primitive codec is written against.
//!
//! # Overview
//!
//! - [`Chunk`] - a contiguous byte region that can be frozen and forked
//! - [`ChunkSource`] - supplies chunks ([`ChunkPool`], [`UnpooledChunkSource`],
//!   [`InputBufferChunkSource`], [`OutputBufferChunkSource`])
//! - [`ByteBuffer`] - logical byte array over one ([`SingleChunkBuffer`]) or
//!   many ([`MultiChunkBuffer`]) chunks
//! - [`ByteSource`] / [`ByteSink`] - cursor based input and output, with the
//!   optional [`DirectBufferAccess`] capability
//! - [`ScratchCache`] - a reusable scratch stream handed out as a scoped lease
//!
//! # Example
//!
//! ```
//! use bson_io_buffers::{ByteBuffer, ByteBufferStream, ByteSink, MultiChunkBuffer, UnpooledChunkSource};
//!
//! let buffer = MultiChunkBuffer::with_source(UnpooledChunkSource);
//! let mut stream = ByteBufferStream::new(buffer);
//! stream.write_all(b"hello").unwrap();
//! assert_eq!(stream.buffer().to_vec().unwrap(), b"hello");
//! ```

mod byte_buffer;
mod chunk;
mod chunk_source;
mod error;
pub mod factory;
mod multi_chunk;
mod pool;
mod scratch;
mod single_chunk;
mod stream;

pub use byte_buffer::ByteBuffer;
pub use chunk::{Chunk, ChunkRecycler};
pub use chunk_source::{
    ChunkSource, InputBufferChunkSource, OutputBufferChunkSource, UnpooledChunkSource,
};
pub use error::BufferError;
pub use multi_chunk::MultiChunkBuffer;
pub use pool::{ChunkPool, ChunkPoolStats};
pub use scratch::{ScratchCache, ScratchLease};
pub use single_chunk::SingleChunkBuffer;
pub use stream::{
    ByteBufferStream, ByteSink, ByteSource, DirectBufferAccess, IoStream, SliceSource,
};
