//! Reference-counted byte regions.

use std::fmt;
use std::mem;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::BufferError;

/// Receives the storage of a chunk once its last handle has been released.
pub trait ChunkRecycler: Send + Sync + 'static {
    fn reclaim(&self, storage: BytesMut);
}

enum Storage {
    Writable(BytesMut),
    Frozen(Bytes),
    Released,
}

/// A contiguous byte region handed out by a [`ChunkSource`](crate::ChunkSource).
///
/// A chunk starts out writable and exclusively owned. Once frozen it becomes
/// read-only and can be forked into additional handles sharing the same
/// storage. The storage goes back to its recycler (if any) when the last
/// handle is dropped.
pub struct Chunk {
    storage: Storage,
    recycler: Option<Arc<dyn ChunkRecycler>>,
}

impl Chunk {
    /// Wraps storage that is not owned by any pool.
    pub fn new(storage: BytesMut) -> Self {
        Self {
            storage: Storage::Writable(storage),
            recycler: None,
        }
    }

    /// Allocates a zero-filled unpooled chunk.
    pub fn zeroed(len: usize) -> Self {
        Self::new(BytesMut::zeroed(len))
    }

    /// Copies `data` into a new unpooled chunk.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(BytesMut::from(data))
    }

    pub(crate) fn pooled(storage: BytesMut, recycler: Arc<dyn ChunkRecycler>) -> Self {
        Self {
            storage: Storage::Writable(storage),
            recycler: Some(recycler),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self.storage, Storage::Frozen(_))
    }

    pub fn is_pooled(&self) -> bool {
        self.recycler.is_some()
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Writable(buf) => buf,
            Storage::Frozen(bytes) => bytes,
            Storage::Released => &[],
        }
    }

    /// Mutable view of the chunk. Fails once the chunk has been frozen.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], BufferError> {
        match &mut self.storage {
            Storage::Writable(buf) => Ok(buf),
            Storage::Frozen(_) => Err(BufferError::ReadOnly),
            Storage::Released => Err(BufferError::Disposed),
        }
    }

    /// Makes the chunk read-only. Freezing twice is a no-op.
    pub fn freeze(&mut self) {
        self.storage = match mem::replace(&mut self.storage, Storage::Released) {
            Storage::Writable(buf) => Storage::Frozen(buf.freeze()),
            other => other,
        };
    }

    /// Creates another handle to the same frozen storage.
    pub fn fork(&self) -> Result<Chunk, BufferError> {
        match &self.storage {
            Storage::Frozen(bytes) => Ok(Chunk {
                storage: Storage::Frozen(bytes.clone()),
                recycler: self.recycler.clone(),
            }),
            Storage::Writable(_) => Err(BufferError::NotReadOnly),
            Storage::Released => Err(BufferError::Disposed),
        }
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let Some(recycler) = self.recycler.take() else {
            return;
        };
        let storage = match mem::replace(&mut self.storage, Storage::Released) {
            Storage::Writable(buf) => Some(buf),
            // Only the last fork gets unique ownership back.
            Storage::Frozen(bytes) => bytes.try_into_mut().ok(),
            Storage::Released => None,
        };
        if let Some(storage) = storage {
            recycler.reclaim(storage);
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("len", &self.len())
            .field("frozen", &self.is_frozen())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}
