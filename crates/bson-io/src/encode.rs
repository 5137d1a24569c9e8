//! One-shot encoding through a cached scratch stream.

use bson_io_buffers::{ByteBuffer, ByteBufferStream, MultiChunkBuffer, ScratchCache};

use crate::error::{BsonError, MisuseError};
use crate::settings::WriterSettings;
use crate::writer::{BsonWriter, WriterState};

/// Encodes one top-level document with `f` and returns its bytes.
///
/// The writer runs over a stream leased from `cache`, so repeated calls
/// reuse the same chunks. `f` must leave the writer in the `Done` state.
///
/// ```
/// use bson_io::{encode_document, WriterSettings};
/// use bson_io_buffers::ScratchCache;
///
/// let cache = ScratchCache::new();
/// let bytes = encode_document(&cache, &WriterSettings::default(), |w| {
///     w.write_start_document()?;
///     w.write_name("ok")?;
///     w.write_boolean(true)?;
///     w.write_end_document()
/// })
/// .unwrap();
/// assert_eq!(bytes, [0x0A, 0, 0, 0, 0x08, b'o', b'k', 0, 1, 0]);
/// ```
pub fn encode_document<F>(
    cache: &ScratchCache,
    settings: &WriterSettings,
    f: F,
) -> Result<Vec<u8>, BsonError>
where
    F: FnOnce(&mut BsonWriter<&mut ByteBufferStream<MultiChunkBuffer>>) -> Result<(), BsonError>,
{
    let mut lease = cache.lease()?;
    let mut writer = BsonWriter::with_settings(&mut *lease, settings.clone());
    f(&mut writer)?;
    if writer.state() != WriterState::Done {
        return Err(MisuseError::InvalidState {
            method: "encode_document",
            expected: WriterState::Done.to_string(),
            actual: writer.state().to_string(),
        }
        .into());
    }
    drop(writer);
    Ok(lease.buffer().to_vec()?)
}
