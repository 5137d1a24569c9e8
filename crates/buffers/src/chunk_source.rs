//! Chunk sources and the sizing policies layered over them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::pool::ChunkPool;
use crate::BufferError;

/// Supplies chunks to growable buffers.
///
/// The returned chunk may be smaller or larger than `requested_size`; callers
/// keep asking until they have enough capacity.
pub trait ChunkSource: Send + Sync {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError>;
}

impl<T: ChunkSource + ?Sized> ChunkSource for Arc<T> {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError> {
        (**self).get_chunk(requested_size)
    }
}

impl<T: ChunkSource + ?Sized> ChunkSource for &T {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError> {
        (**self).get_chunk(requested_size)
    }
}

/// Allocates a fresh chunk of exactly the requested size.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnpooledChunkSource;

impl ChunkSource for UnpooledChunkSource {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError> {
        if requested_size == 0 {
            return Err(BufferError::InvalidArgument("requested chunk size must be positive"));
        }
        Ok(Chunk::zeroed(requested_size))
    }
}

/// Sizing policy for buffers that receive input of a roughly known size.
///
/// Tiny requests are served unpooled at their exact size. Larger requests
/// round to a power of two (rounding down when rounding up would waste more
/// than 1/8 of the chunk), clamped to `[min_chunk_size, max_chunk_size]`.
#[derive(Debug, Clone)]
pub struct InputBufferChunkSource<S = ChunkPool> {
    base: S,
    max_unpooled_chunk_size: usize,
    min_chunk_size: usize,
    max_chunk_size: usize,
}

impl<S: ChunkSource> InputBufferChunkSource<S> {
    pub const DEFAULT_MAX_UNPOOLED_CHUNK_SIZE: usize = 4;
    pub const DEFAULT_MIN_CHUNK_SIZE: usize = 16 * 1024;
    pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

    pub fn new(base: S) -> Self {
        Self {
            base,
            max_unpooled_chunk_size: Self::DEFAULT_MAX_UNPOOLED_CHUNK_SIZE,
            min_chunk_size: Self::DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: Self::DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    pub fn with_limits(
        base: S,
        max_unpooled_chunk_size: usize,
        min_chunk_size: usize,
        max_chunk_size: usize,
    ) -> Result<Self, BufferError> {
        if min_chunk_size == 0 || min_chunk_size > max_chunk_size {
            return Err(BufferError::InvalidArgument(
                "min_chunk_size must be positive and not above max_chunk_size",
            ));
        }
        Ok(Self {
            base,
            max_unpooled_chunk_size,
            min_chunk_size,
            max_chunk_size,
        })
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn max_unpooled_chunk_size(&self) -> usize {
        self.max_unpooled_chunk_size
    }

    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    fn chunk_size_for(&self, requested_size: usize) -> usize {
        let mut size = requested_size.next_power_of_two();
        if size - requested_size > size >> 3 {
            size >>= 1;
        }
        size.clamp(self.min_chunk_size, self.max_chunk_size)
    }
}

impl Default for InputBufferChunkSource<ChunkPool> {
    fn default() -> Self {
        Self::new(ChunkPool::shared().clone())
    }
}

impl<S: ChunkSource> ChunkSource for InputBufferChunkSource<S> {
    fn get_chunk(&self, requested_size: usize) -> Result<Chunk, BufferError> {
        if requested_size == 0 {
            return Err(BufferError::InvalidArgument("requested chunk size must be positive"));
        }
        if requested_size < self.max_unpooled_chunk_size {
            return Ok(Chunk::zeroed(requested_size));
        }
        self.base.get_chunk(self.chunk_size_for(requested_size))
    }
}

/// Sizing policy for buffers that accumulate output of unknown size.
///
/// The first chunk is unpooled at `initial_unpooled_chunk_size`; every later
/// chunk doubles the previous one, clamped to `[min_chunk_size, max_chunk_size]`.
#[derive(Debug)]
pub struct OutputBufferChunkSource<S = ChunkPool> {
    base: S,
    initial_unpooled_chunk_size: usize,
    min_chunk_size: usize,
    max_chunk_size: usize,
    previous_chunk_size: AtomicUsize,
}

impl<S: ChunkSource> OutputBufferChunkSource<S> {
    pub const DEFAULT_INITIAL_UNPOOLED_CHUNK_SIZE: usize = 1024;
    pub const DEFAULT_MIN_CHUNK_SIZE: usize = 16 * 1024;
    pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

    pub fn new(base: S) -> Self {
        Self {
            base,
            initial_unpooled_chunk_size: Self::DEFAULT_INITIAL_UNPOOLED_CHUNK_SIZE,
            min_chunk_size: Self::DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: Self::DEFAULT_MAX_CHUNK_SIZE,
            previous_chunk_size: AtomicUsize::new(0),
        }
    }

    /// An `initial_unpooled_chunk_size` of zero makes every chunk come from `base`.
    pub fn with_limits(
        base: S,
        initial_unpooled_chunk_size: usize,
        min_chunk_size: usize,
        max_chunk_size: usize,
    ) -> Result<Self, BufferError> {
        if min_chunk_size == 0 || min_chunk_size > max_chunk_size {
            return Err(BufferError::InvalidArgument(
                "min_chunk_size must be positive and not above max_chunk_size",
            ));
        }
        Ok(Self {
            base,
            initial_unpooled_chunk_size,
            min_chunk_size,
            max_chunk_size,
            previous_chunk_size: AtomicUsize::new(0),
        })
    }

    pub fn base(&self) -> &S {
        &self.base
    }

    pub fn initial_unpooled_chunk_size(&self) -> usize {
        self.initial_unpooled_chunk_size
    }

    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Size of the most recently returned chunk, zero before the first one.
    pub fn previous_chunk_size(&self) -> usize {
        self.previous_chunk_size.load(Ordering::Relaxed)
    }
}

impl Default for OutputBufferChunkSource<ChunkPool> {
    fn default() -> Self {
        Self::new(ChunkPool::shared().clone())
    }
}

impl<S: ChunkSource> ChunkSource for OutputBufferChunkSource<S> {
    fn get_chunk(&self, _requested_size: usize) -> Result<Chunk, BufferError> {
        let previous = self.previous_chunk_size.load(Ordering::Relaxed);
        let chunk = if previous == 0 && self.initial_unpooled_chunk_size != 0 {
            Chunk::zeroed(self.initial_unpooled_chunk_size)
        } else {
            let size = previous
                .saturating_mul(2)
                .max(1)
                .checked_next_power_of_two()
                .unwrap_or(self.max_chunk_size)
                .clamp(self.min_chunk_size, self.max_chunk_size);
            self.base.get_chunk(size)?
        };
        self.previous_chunk_size.store(chunk.len(), Ordering::Relaxed);
        Ok(chunk)
    }
}
