//! Reusable scratch stream handed out as a scoped lease.

use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::debug;

use crate::byte_buffer::ByteBuffer;
use crate::chunk_source::{ChunkSource, OutputBufferChunkSource};
use crate::multi_chunk::MultiChunkBuffer;
use crate::pool::ChunkPool;
use crate::stream::ByteBufferStream;
use crate::BufferError;

type ScratchStream = ByteBufferStream<MultiChunkBuffer>;

/// Caches one growable stream for repeated encode operations.
///
/// The cache is not `Sync`; keep one per thread, for example in a
/// `thread_local!`. Leasing while a lease is outstanding fails with
/// [`BufferError::ScratchInUse`] instead of handing out the same stream
/// twice.
///
/// ```
/// use bson_io_buffers::{BufferError, ByteSink, ScratchCache};
///
/// let cache = ScratchCache::new();
/// let mut lease = cache.lease().unwrap();
/// lease.write_all(b"abc").unwrap();
/// assert_eq!(cache.lease().unwrap_err(), BufferError::ScratchInUse);
/// drop(lease);
/// assert_eq!(cache.lease().unwrap().len(), 0);
/// ```
pub struct ScratchCache {
    pool: ChunkPool,
    max_retained_capacity: usize,
    in_use: Cell<bool>,
    slot: Cell<Option<ScratchStream>>,
}

impl ScratchCache {
    pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::with_pool(ChunkPool::shared().clone(), Self::DEFAULT_MAX_RETAINED_CAPACITY)
    }

    /// Streams grow through an [`OutputBufferChunkSource`] over `pool`. A
    /// stream whose capacity exceeds `max_retained_capacity` is released
    /// instead of being cached when its lease ends.
    pub fn with_pool(pool: ChunkPool, max_retained_capacity: usize) -> Self {
        Self {
            pool,
            max_retained_capacity,
            in_use: Cell::new(false),
            slot: Cell::new(None),
        }
    }

    pub fn is_leased(&self) -> bool {
        self.in_use.get()
    }

    pub fn lease(&self) -> Result<ScratchLease<'_>, BufferError> {
        if self.in_use.replace(true) {
            debug!("scratch buffer requested while already leased");
            return Err(BufferError::ScratchInUse);
        }
        let stream = self.slot.take().unwrap_or_else(|| self.fresh_stream());
        Ok(ScratchLease {
            cache: self,
            stream,
        })
    }

    fn fresh_stream(&self) -> ScratchStream {
        let source: Arc<dyn ChunkSource> = Arc::new(OutputBufferChunkSource::new(self.pool.clone()));
        ByteBufferStream::new(MultiChunkBuffer::new(source))
    }

    fn release(&self, mut stream: ScratchStream) {
        stream.set_position(0);
        let retained = stream.buffer().capacity() <= self.max_retained_capacity
            && stream.buffer_mut().set_len(0).is_ok();
        if retained {
            self.slot.set(Some(stream));
        } else {
            debug!(
                capacity = stream.buffer().capacity(),
                "dropping oversized scratch buffer"
            );
        }
        self.in_use.set(false);
    }
}

impl Default for ScratchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScratchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchCache")
            .field("max_retained_capacity", &self.max_retained_capacity)
            .field("in_use", &self.in_use.get())
            .finish()
    }
}

/// Exclusive access to the cached scratch stream.
///
/// The stream is reset and returned to its cache when the lease is dropped.
#[derive(Debug)]
pub struct ScratchLease<'a> {
    cache: &'a ScratchCache,
    stream: ScratchStream,
}

impl Deref for ScratchLease<'_> {
    type Target = ScratchStream;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl DerefMut for ScratchLease<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        let stream = std::mem::replace(
            &mut self.stream,
            ByteBufferStream::new(MultiChunkBuffer::default()),
        );
        self.cache.release(stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ByteSink;

    #[test]
    fn test_lease_is_reset_between_uses() {
        let cache = ScratchCache::with_pool(ChunkPool::new(4, 64), 1 << 20);
        {
            let mut lease = cache.lease().unwrap();
            lease.write_all(b"first").unwrap();
            assert_eq!(lease.len(), 5);
        }
        let lease = cache.lease().unwrap();
        assert_eq!(lease.len(), 0);
        assert_eq!(lease.position(), 0);
        assert!(lease.buffer().capacity() >= 5);
    }

    #[test]
    fn test_nested_lease_rejected() {
        let cache = ScratchCache::new();
        let _outer = cache.lease().unwrap();
        assert!(cache.is_leased());
        assert_eq!(cache.lease().unwrap_err(), BufferError::ScratchInUse);
    }

    #[test]
    fn test_released_on_early_exit() {
        fn fails(cache: &ScratchCache) -> Result<(), BufferError> {
            let mut lease = cache.lease()?;
            lease.write_all(b"x")?;
            Err(BufferError::EndOfStream)
        }
        let cache = ScratchCache::new();
        assert!(fails(&cache).is_err());
        assert!(!cache.is_leased());
    }

    #[test]
    fn test_oversized_stream_not_retained() {
        let cache = ScratchCache::with_pool(ChunkPool::new(4, 64), 16);
        {
            let mut lease = cache.lease().unwrap();
            lease.write_all(&[0u8; 2048]).unwrap();
        }
        let lease = cache.lease().unwrap();
        assert_eq!(lease.buffer().capacity(), 0);
    }
}
