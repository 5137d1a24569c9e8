//! Cursor based byte sources and sinks.
//!
//! [`ByteSource`] and [`ByteSink`] are the seams the primitive codec is
//! written against. Implementations backed by in-memory storage also expose
//! [`DirectBufferAccess`], letting callers work on contiguous windows instead
//! of going byte by byte.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::byte_buffer::ByteBuffer;
use crate::single_chunk::SingleChunkBuffer;
use crate::BufferError;

/// Contiguous window access at the current position.
pub trait DirectBufferAccess {
    /// Bytes available from the current position up to the next chunk
    /// boundary or the end of data. May be empty.
    fn readable_window(&self) -> &[u8];

    /// Prepares `count` bytes at the current position for writing and
    /// returns the writable window there. The window may be shorter than
    /// `count` when the range crosses a chunk boundary.
    fn writable_window(&mut self, count: usize) -> Result<&mut [u8], BufferError>;

    /// Moves the position forward by `count` bytes.
    fn advance(&mut self, count: usize);
}

/// Readable, seekable input.
pub trait ByteSource {
    fn position(&self) -> usize;

    fn len(&self) -> usize;

    fn seek(&mut self, position: usize) -> Result<(), BufferError>;

    fn read_byte(&mut self) -> Result<u8, BufferError>;

    /// Fills `destination` completely or fails with [`BufferError::EndOfStream`].
    fn read_into(&mut self, destination: &mut [u8]) -> Result<(), BufferError>;

    fn skip(&mut self, count: usize) -> Result<(), BufferError> {
        let target = self
            .position()
            .checked_add(count)
            .ok_or(BufferError::EndOfStream)?;
        if target > self.len() {
            return Err(BufferError::EndOfStream);
        }
        self.seek(target)
    }

    fn is_at_end(&self) -> bool {
        self.position() >= self.len()
    }

    /// Read-only view of `length` bytes at `position`. The current position
    /// is left unchanged.
    fn slice(&mut self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        copy_slice(self, position, length)
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        None
    }
}

/// Writable, seekable output.
pub trait ByteSink {
    fn position(&self) -> usize;

    fn len(&self) -> usize;

    fn seek(&mut self, position: usize) -> Result<(), BufferError>;

    fn write_byte(&mut self, value: u8) -> Result<(), BufferError>;

    fn write_all(&mut self, source: &[u8]) -> Result<(), BufferError>;

    /// Appends the logical contents of `buffer`.
    fn write_buffer(&mut self, buffer: &dyn ByteBuffer) -> Result<(), BufferError> {
        let mut position = 0;
        while position < buffer.len() {
            let window = buffer.access_backing_bytes(position)?;
            if window.is_empty() {
                return Err(BufferError::EndOfStream);
            }
            self.write_all(window)?;
            position += window.len();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BufferError> {
        Ok(())
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        None
    }
}

/// Copies `length` bytes at `position` into a fresh read-only buffer.
fn copy_slice<S: ByteSource + ?Sized>(
    source: &mut S,
    position: usize,
    length: usize,
) -> Result<Box<dyn ByteBuffer>, BufferError> {
    let saved = source.position();
    source.seek(position)?;
    let mut data = vec![0u8; length];
    let result = source.read_into(&mut data);
    source.seek(saved)?;
    result?;
    Ok(Box::new(SingleChunkBuffer::from_slice(&data, true)))
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        (**self).seek(position)
    }

    fn read_byte(&mut self) -> Result<u8, BufferError> {
        (**self).read_byte()
    }

    fn read_into(&mut self, destination: &mut [u8]) -> Result<(), BufferError> {
        (**self).read_into(destination)
    }

    fn skip(&mut self, count: usize) -> Result<(), BufferError> {
        (**self).skip(count)
    }

    fn is_at_end(&self) -> bool {
        (**self).is_at_end()
    }

    fn slice(&mut self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        (**self).slice(position, length)
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        (**self).direct()
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn position(&self) -> usize {
        (**self).position()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        (**self).seek(position)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), BufferError> {
        (**self).write_byte(value)
    }

    fn write_all(&mut self, source: &[u8]) -> Result<(), BufferError> {
        (**self).write_all(source)
    }

    fn write_buffer(&mut self, buffer: &dyn ByteBuffer) -> Result<(), BufferError> {
        (**self).write_buffer(buffer)
    }

    fn flush(&mut self) -> Result<(), BufferError> {
        (**self).flush()
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        (**self).direct()
    }
}

// ---------------------------------------------------------------------------
// ByteBufferStream

/// Readable and writable stream over a [`ByteBuffer`].
///
/// Writes past the current length grow the buffer through its chunk source;
/// a gap between the old length and the write position is zero-filled.
#[derive(Debug)]
pub struct ByteBufferStream<B = Box<dyn ByteBuffer>> {
    buffer: B,
    position: usize,
}

impl<B: ByteBuffer> ByteBufferStream<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor. Positions past the end are allowed; reading there
    /// fails and writing there zero-fills the gap.
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Sets the length of the underlying buffer, growing it if needed.
    pub fn set_len(&mut self, len: usize) -> Result<(), BufferError> {
        self.buffer.ensure_capacity(len)?;
        self.buffer.set_len(len)?;
        if self.position > len {
            self.position = len;
        }
        Ok(())
    }

    /// Read-only view of `length` bytes at `position`, sharing storage.
    pub fn get_slice(&self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        self.buffer.get_slice(position, length)
    }

    fn prepare_to_write(&mut self, count: usize) -> Result<(), BufferError> {
        if self.buffer.is_read_only() {
            return Err(BufferError::ReadOnly);
        }
        let end = self
            .position
            .checked_add(count)
            .ok_or(BufferError::InvalidArgument("write past addressable range"))?;
        self.buffer.ensure_capacity(end)?;
        let length = self.buffer.len();
        if end > length {
            self.buffer.set_len(end)?;
            if self.position > length {
                self.buffer.clear(length, self.position - length)?;
            }
        }
        Ok(())
    }
}

impl<B: ByteBuffer> ByteSource for ByteBufferStream<B> {
    fn position(&self) -> usize {
        self.position
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        self.position = position;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BufferError> {
        if self.position >= self.buffer.len() {
            return Err(BufferError::EndOfStream);
        }
        let value = self.buffer.get_byte(self.position)?;
        self.position += 1;
        Ok(value)
    }

    fn read_into(&mut self, destination: &mut [u8]) -> Result<(), BufferError> {
        let length = self.buffer.len();
        let available = length.saturating_sub(self.position);
        if destination.len() > available {
            self.position = self.position.max(length);
            return Err(BufferError::EndOfStream);
        }
        self.buffer.get_bytes(self.position, destination)?;
        self.position += destination.len();
        Ok(())
    }

    fn slice(&mut self, position: usize, length: usize) -> Result<Box<dyn ByteBuffer>, BufferError> {
        if self.buffer.is_read_only() {
            self.buffer.get_slice(position, length)
        } else {
            copy_slice(self, position, length)
        }
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        Some(self)
    }
}

impl<B: ByteBuffer> ByteSink for ByteBufferStream<B> {
    fn position(&self) -> usize {
        self.position
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        self.position = position;
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), BufferError> {
        self.prepare_to_write(1)?;
        self.buffer.set_byte(self.position, value)?;
        self.position += 1;
        Ok(())
    }

    fn write_all(&mut self, source: &[u8]) -> Result<(), BufferError> {
        self.prepare_to_write(source.len())?;
        self.buffer.set_bytes(self.position, source)?;
        self.position += source.len();
        Ok(())
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        Some(self)
    }
}

impl<B: ByteBuffer> DirectBufferAccess for ByteBufferStream<B> {
    fn readable_window(&self) -> &[u8] {
        self.buffer
            .access_backing_bytes(self.position)
            .unwrap_or_default()
    }

    fn writable_window(&mut self, count: usize) -> Result<&mut [u8], BufferError> {
        self.prepare_to_write(count)?;
        self.buffer.access_backing_bytes_mut(self.position)
    }

    fn advance(&mut self, count: usize) {
        self.position += count;
    }
}

// ---------------------------------------------------------------------------
// SliceSource

/// Read-only source over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn get_ref(&self) -> &'a [u8] {
        self.data
    }
}

impl ByteSource for SliceSource<'_> {
    fn position(&self) -> usize {
        self.position
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        self.position = position;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BufferError> {
        let value = *self.data.get(self.position).ok_or(BufferError::EndOfStream)?;
        self.position += 1;
        Ok(value)
    }

    fn read_into(&mut self, destination: &mut [u8]) -> Result<(), BufferError> {
        let end = self
            .position
            .checked_add(destination.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(BufferError::EndOfStream)?;
        destination.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }

    fn direct(&mut self) -> Option<&mut dyn DirectBufferAccess> {
        Some(self)
    }
}

impl DirectBufferAccess for SliceSource<'_> {
    fn readable_window(&self) -> &[u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    fn writable_window(&mut self, _count: usize) -> Result<&mut [u8], BufferError> {
        Err(BufferError::ReadOnly)
    }

    fn advance(&mut self, count: usize) {
        self.position += count;
    }
}

// ---------------------------------------------------------------------------
// IoStream

/// Adapter over a `std::io` stream.
///
/// Every operation goes through the wrapped stream; there is no direct
/// window access.
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
    position: usize,
    length: usize,
}

impl<T: Seek> IoStream<T> {
    pub fn new(mut inner: T) -> Result<Self, BufferError> {
        let position = inner.stream_position()?;
        let length = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(position))?;
        Ok(Self {
            inner,
            position: to_usize(position)?,
            length: to_usize(length)?,
        })
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn seek_inner(&mut self, position: usize) -> Result<(), BufferError> {
        self.inner.seek(SeekFrom::Start(position as u64))?;
        self.position = position;
        Ok(())
    }
}

fn to_usize(value: u64) -> Result<usize, BufferError> {
    usize::try_from(value).map_err(|_| BufferError::InvalidArgument("stream offset exceeds usize"))
}

impl<T: Read + Seek> ByteSource for IoStream<T> {
    fn position(&self) -> usize {
        self.position
    }

    fn len(&self) -> usize {
        self.length
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        self.seek_inner(position)
    }

    fn read_byte(&mut self) -> Result<u8, BufferError> {
        let mut byte = [0u8; 1];
        self.read_into(&mut byte)?;
        Ok(byte[0])
    }

    fn read_into(&mut self, destination: &mut [u8]) -> Result<(), BufferError> {
        if let Err(err) = self.inner.read_exact(destination) {
            // A short read leaves the inner stream advanced by an unknown count.
            self.position = to_usize(self.inner.stream_position()?)?;
            return Err(err.into());
        }
        self.position += destination.len();
        Ok(())
    }
}

impl<T: Write + Seek> ByteSink for IoStream<T> {
    fn position(&self) -> usize {
        self.position
    }

    fn len(&self) -> usize {
        self.length
    }

    fn seek(&mut self, position: usize) -> Result<(), BufferError> {
        self.seek_inner(position)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), BufferError> {
        self.write_all(&[value])
    }

    fn write_all(&mut self, source: &[u8]) -> Result<(), BufferError> {
        Write::write_all(&mut self.inner, source)?;
        self.position += source.len();
        self.length = self.length.max(self.position);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BufferError> {
        self.inner.flush().map_err(BufferError::from)
    }
}
