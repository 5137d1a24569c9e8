//! Fixed-size chunk pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::BytesMut;
use parking_lot::Mutex;
use tracing::trace;

use crate::chunk::{Chunk, ChunkRecycler};
use crate::chunk_source::ChunkSource;
use crate::BufferError;

/// Snapshot of a pool's configuration and occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPoolStats {
    pub chunk_size: usize,
    pub max_chunk_count: usize,
    /// Chunks currently waiting in the free list.
    pub pooled_chunks: usize,
    /// Chunks allocated because the free list was empty.
    pub allocated_chunks: usize,
    /// Chunks served from the free list.
    pub reused_chunks: usize,
}

struct PoolInner {
    chunk_size: usize,
    max_chunk_count: usize,
    free: Mutex<Vec<BytesMut>>,
    allocated: AtomicUsize,
    reused: AtomicUsize,
}

impl ChunkRecycler for PoolInner {
    fn reclaim(&self, mut storage: BytesMut) {
        storage.clear();
        storage.resize(self.chunk_size, 0);
        let mut free = self.free.lock();
        if free.len() < self.max_chunk_count {
            free.push(storage);
            trace!(pooled = free.len(), "chunk returned to pool");
        } else {
            trace!(max = self.max_chunk_count, "chunk pool full, releasing chunk");
        }
    }
}

/// A pool of equally sized chunks.
///
/// Every chunk handed out has exactly [`chunk_size`](Self::chunk_size) bytes,
/// regardless of the size requested. Released chunks are kept for reuse up to
/// `max_chunk_count`; beyond that they are dropped. Clones share the same
/// free list.
#[derive(Clone)]
pub struct ChunkPool {
    inner: Arc<PoolInner>,
}

impl ChunkPool {
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
    pub const DEFAULT_MAX_CHUNK_COUNT: usize = 8192;

    pub fn new(max_chunk_count: usize, chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                chunk_size: chunk_size.max(1),
                max_chunk_count,
                free: Mutex::new(Vec::new()),
                allocated: AtomicUsize::new(0),
                reused: AtomicUsize::new(0),
            }),
        }
    }

    /// Process-wide pool of 64 KiB chunks.
    pub fn shared() -> &'static ChunkPool {
        static SHARED: OnceLock<ChunkPool> = OnceLock::new();
        SHARED.get_or_init(|| {
            ChunkPool::new(Self::DEFAULT_MAX_CHUNK_COUNT, Self::DEFAULT_CHUNK_SIZE)
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    pub fn max_chunk_count(&self) -> usize {
        self.inner.max_chunk_count
    }

    pub fn pooled_chunks(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn stats(&self) -> ChunkPoolStats {
        ChunkPoolStats {
            chunk_size: self.inner.chunk_size,
            max_chunk_count: self.inner.max_chunk_count,
            pooled_chunks: self.pooled_chunks(),
            allocated_chunks: self.inner.allocated.load(Ordering::Relaxed),
            reused_chunks: self.inner.reused.load(Ordering::Relaxed),
        }
    }

    /// Drops every chunk in the free list and returns how many were released.
    pub fn clear(&self) -> usize {
        let mut free = self.inner.free.lock();
        let released = free.len();
        free.clear();
        released
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_CHUNK_COUNT, Self::DEFAULT_CHUNK_SIZE)
    }
}

impl std::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("chunk_size", &self.inner.chunk_size)
            .field("max_chunk_count", &self.inner.max_chunk_count)
            .finish()
    }
}

impl ChunkSource for ChunkPool {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError> {
        if requested_size == 0 {
            return Err(BufferError::InvalidArgument("requested chunk size must be positive"));
        }
        let reused = self.inner.free.lock().pop();
        let storage = match reused {
            Some(storage) => {
                self.inner.reused.fetch_add(1, Ordering::Relaxed);
                storage
            }
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                trace!(chunk_size = self.inner.chunk_size, "allocating pooled chunk");
                BytesMut::zeroed(self.inner.chunk_size)
            }
        };
        Ok(Chunk::pooled(storage, self.inner.clone()))
    }
}
