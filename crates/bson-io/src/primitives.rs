//! Little-endian primitive encoding over byte sources and sinks.
//!
//! Every operation first tries the source's or sink's [`DirectBufferAccess`]
//! window and falls back to plain `read_into`/`write_all` when the window is
//! missing or too short (for example at a chunk boundary).
//!
//! [`DirectBufferAccess`]: bson_io_buffers::DirectBufferAccess

use bson_io_buffers::{ByteSink, ByteSource};

use crate::error::{BsonError, FormatError, MisuseError};
use crate::values::{Decimal128, ObjectId};

fn decode_utf8(bytes: &[u8]) -> Result<String, BsonError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => Err(FormatError::InvalidUtf8.into()),
    }
}

/// Decoding helpers available on every [`ByteSource`].
pub trait BsonRead: ByteSource {
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BsonError> {
        let mut bytes = [0u8; N];
        if let Some(direct) = self.direct() {
            let window = direct.readable_window();
            if window.len() >= N {
                bytes.copy_from_slice(&window[..N]);
                direct.advance(N);
                return Ok(bytes);
            }
        }
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    fn read_i32_le(&mut self) -> Result<i32, BsonError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_i64_le(&mut self) -> Result<i64, BsonError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_u64_le(&mut self) -> Result<u64, BsonError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_f64_le(&mut self) -> Result<f64, BsonError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_object_id(&mut self) -> Result<ObjectId, BsonError> {
        Ok(ObjectId::from_bytes(self.read_array()?))
    }

    fn read_decimal128(&mut self) -> Result<Decimal128, BsonError> {
        Ok(Decimal128::from_bytes(self.read_array()?))
    }

    fn read_vec(&mut self, count: usize) -> Result<Vec<u8>, BsonError> {
        if count > self.len().saturating_sub(self.position()) {
            return Err(FormatError::EndOfStream.into());
        }
        let mut bytes = vec![0u8; count];
        self.read_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a length-prefixed string: i32 length counting the terminator,
    /// UTF-8 bytes, then `0x00`.
    fn read_bson_string(&mut self) -> Result<String, BsonError> {
        let length = self.read_i32_le()?;
        if length <= 0 {
            return Err(FormatError::InvalidStringLength(length).into());
        }
        let length = length as usize;
        if let Some(direct) = self.direct() {
            let window = direct.readable_window();
            if window.len() >= length {
                if window[length - 1] != 0 {
                    return Err(FormatError::MissingNullTerminator.into());
                }
                let value = decode_utf8(&window[..length - 1])?;
                direct.advance(length);
                return Ok(value);
            }
        }
        let mut bytes = self.read_vec(length)?;
        if bytes.pop() != Some(0) {
            return Err(FormatError::MissingNullTerminator.into());
        }
        String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8.into())
    }

    /// Reads UTF-8 bytes up to and including the next `0x00`.
    fn read_cstring(&mut self) -> Result<String, BsonError> {
        if let Some(direct) = self.direct() {
            let window = direct.readable_window();
            if let Some(end) = window.iter().position(|&b| b == 0) {
                let value = decode_utf8(&window[..end])?;
                direct.advance(end + 1);
                return Ok(value);
            }
        }
        let mut bytes = Vec::new();
        loop {
            match self.read_byte()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8.into())
    }

    fn skip_cstring(&mut self) -> Result<(), BsonError> {
        if let Some(direct) = self.direct() {
            let window = direct.readable_window();
            if let Some(end) = window.iter().position(|&b| b == 0) {
                direct.advance(end + 1);
                return Ok(());
            }
        }
        while self.read_byte()? != 0 {}
        Ok(())
    }
}

impl<S: ByteSource + ?Sized> BsonRead for S {}

/// Encoding helpers available on every [`ByteSink`].
pub trait BsonWrite: ByteSink {
    fn write_array<const N: usize>(&mut self, bytes: [u8; N]) -> Result<(), BsonError> {
        if let Some(direct) = self.direct() {
            let window = direct.writable_window(N)?;
            if window.len() >= N {
                window[..N].copy_from_slice(&bytes);
                direct.advance(N);
                return Ok(());
            }
        }
        self.write_all(&bytes)?;
        Ok(())
    }

    fn write_i32_le(&mut self, value: i32) -> Result<(), BsonError> {
        self.write_array(value.to_le_bytes())
    }

    fn write_i64_le(&mut self, value: i64) -> Result<(), BsonError> {
        self.write_array(value.to_le_bytes())
    }

    fn write_u64_le(&mut self, value: u64) -> Result<(), BsonError> {
        self.write_array(value.to_le_bytes())
    }

    fn write_f64_le(&mut self, value: f64) -> Result<(), BsonError> {
        self.write_array(value.to_le_bytes())
    }

    fn write_object_id(&mut self, value: &ObjectId) -> Result<(), BsonError> {
        self.write_array(value.bytes())
    }

    fn write_decimal128(&mut self, value: &Decimal128) -> Result<(), BsonError> {
        self.write_array(value.to_bytes())
    }

    /// Writes `bytes` followed by a terminating `0x00`, through the direct
    /// window when the whole run fits in it.
    fn write_terminated(&mut self, bytes: &[u8]) -> Result<(), BsonError> {
        let count = bytes.len() + 1;
        if let Some(direct) = self.direct() {
            let window = direct.writable_window(count)?;
            if window.len() >= count {
                window[..bytes.len()].copy_from_slice(bytes);
                window[bytes.len()] = 0;
                direct.advance(count);
                return Ok(());
            }
        }
        self.write_all(bytes)?;
        self.write_byte(0)?;
        Ok(())
    }

    /// Writes a length-prefixed string.
    fn write_bson_string(&mut self, value: &str) -> Result<(), BsonError> {
        let length = wire_length(value.len() + 1)?;
        self.write_i32_le(length)?;
        self.write_terminated(value.as_bytes())
    }

    /// Writes a C-string. Fails when `value` contains a null byte.
    fn write_cstring(&mut self, value: &str) -> Result<(), BsonError> {
        if value.as_bytes().contains(&0) {
            return Err(MisuseError::CStringContainsNull.into());
        }
        self.write_terminated(value.as_bytes())
    }
}

impl<S: ByteSink + ?Sized> BsonWrite for S {}

/// Converts a byte count into an i32 length field.
pub(crate) fn wire_length(length: usize) -> Result<i32, BsonError> {
    i32::try_from(length).map_err(|_| {
        FormatError::DocumentTooLarge {
            size: length,
            max: i32::MAX as usize,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_io_buffers::{
        ByteBuffer, ByteBufferStream, ChunkPool, IoStream, MultiChunkBuffer, SliceSource,
        UnpooledChunkSource,
    };
    use std::io::Cursor;

    fn chunked(chunk_size: usize) -> ByteBufferStream<MultiChunkBuffer> {
        ByteBufferStream::new(MultiChunkBuffer::with_source(ChunkPool::new(8, chunk_size)))
    }

    #[test]
    fn test_fixed_width_little_endian() {
        let mut sink = ByteBufferStream::new(MultiChunkBuffer::with_source(UnpooledChunkSource));
        sink.write_i32_le(0x0102_0304).unwrap();
        sink.write_f64_le(1.0).unwrap();
        assert_eq!(
            sink.buffer().to_vec().unwrap(),
            [4, 3, 2, 1, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F]
        );
    }

    #[test]
    fn test_values_straddling_chunks() {
        let mut stream = chunked(3);
        stream.write_i64_le(-2).unwrap();
        stream.write_bson_string("hello").unwrap();
        stream.write_cstring("key").unwrap();
        stream.set_position(0);
        assert_eq!(stream.read_i64_le().unwrap(), -2);
        assert_eq!(stream.read_bson_string().unwrap(), "hello");
        assert_eq!(stream.read_cstring().unwrap(), "key");
        assert!(ByteSource::is_at_end(&stream));
    }

    #[test]
    fn test_slow_path_over_io_stream() {
        let mut stream = IoStream::new(Cursor::new(Vec::new())).unwrap();
        stream.write_bson_string("abc").unwrap();
        stream.write_cstring("x").unwrap();
        ByteSource::seek(&mut stream, 0).unwrap();
        assert_eq!(stream.read_bson_string().unwrap(), "abc");
        stream.skip_cstring().unwrap();
        assert!(ByteSource::is_at_end(&stream));
    }

    #[test]
    fn test_string_length_must_be_positive() {
        let mut source = SliceSource::new(&[0, 0, 0, 0]);
        assert_eq!(
            source.read_bson_string().unwrap_err().format_error(),
            Some(&FormatError::InvalidStringLength(0))
        );
    }

    #[test]
    fn test_string_missing_terminator() {
        let mut source = SliceSource::new(&[2, 0, 0, 0, b'a', b'b']);
        assert_eq!(
            source.read_bson_string().unwrap_err().format_error(),
            Some(&FormatError::MissingNullTerminator)
        );
    }

    #[test]
    fn test_truncated_string() {
        let mut source = SliceSource::new(&[9, 0, 0, 0, b'a', 0]);
        assert_eq!(
            source.read_bson_string().unwrap_err().format_error(),
            Some(&FormatError::EndOfStream)
        );
    }

    #[test]
    fn test_cstring_without_terminator() {
        let mut source = SliceSource::new(b"abc");
        assert_eq!(
            source.read_cstring().unwrap_err().format_error(),
            Some(&FormatError::EndOfStream)
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let mut source = SliceSource::new(&[0xFF, 0xFE, 0]);
        assert_eq!(
            source.read_cstring().unwrap_err().format_error(),
            Some(&FormatError::InvalidUtf8)
        );
    }

    #[test]
    fn test_cstring_rejects_embedded_null() {
        let mut stream = chunked(16);
        assert_eq!(
            stream.write_cstring("a\0b").unwrap_err(),
            BsonError::Misuse(MisuseError::CStringContainsNull)
        );
        assert_eq!(stream.len(), 0);
    }

    #[test]
    fn test_string_may_contain_null() {
        let mut stream = chunked(4);
        stream.write_bson_string("a\0b").unwrap();
        stream.set_position(0);
        assert_eq!(stream.read_bson_string().unwrap(), "a\0b");
    }
}
