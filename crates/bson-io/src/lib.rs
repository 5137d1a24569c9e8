//! Streaming BSON reader and writer.
//!
//! [`BsonReader`] pulls typed tokens out of a [`ByteSource`] and
//! [`BsonWriter`] pushes them into a [`ByteSink`]. Both are strict state
//! machines: calls made out of order fail with [`BsonError::Misuse`], while
//! malformed input fails with [`BsonError::Format`] carrying the dotted path
//! of the element being decoded.
//!
//! The byte sources and sinks come from [`bson_io_buffers`]; sources and
//! sinks that expose [`DirectBufferAccess`] take a faster path for
//! primitive values.
//!
//! # Example
//!
//! ```
//! use bson_io::{BsonReader, BsonType, BsonWriter};
//! use bson_io_buffers::{ByteBuffer, ByteBufferStream, MultiChunkBuffer, SliceSource, UnpooledChunkSource};
//!
//! let stream = ByteBufferStream::new(MultiChunkBuffer::with_source(UnpooledChunkSource));
//! let mut writer = BsonWriter::new(stream);
//! writer.write_start_document().unwrap();
//! writer.write_name("greeting").unwrap();
//! writer.write_string("hello").unwrap();
//! writer.write_end_document().unwrap();
//! let bytes = writer.into_inner().buffer().to_vec().unwrap();
//!
//! let mut reader = BsonReader::new(SliceSource::new(&bytes));
//! reader.read_start_document().unwrap();
//! assert_eq!(reader.read_bson_type().unwrap(), BsonType::String);
//! assert_eq!(reader.read_name().unwrap(), "greeting");
//! assert_eq!(reader.read_string().unwrap(), "hello");
//! ```
//!
//! [`ByteSource`]: bson_io_buffers::ByteSource
//! [`ByteSink`]: bson_io_buffers::ByteSink
//! [`DirectBufferAccess`]: bson_io_buffers::DirectBufferAccess

mod bookmark;
mod bson_type;
mod context;
mod encode;
mod error;
mod primitives;
mod reader;
mod settings;
mod validator;
mod values;
mod writer;

pub use bookmark::BsonReaderBookmark;
pub use bson_type::{BinarySubtype, BsonType};
pub use context::ContextType;
pub use encode::encode_document;
pub use error::{BsonError, FormatError, MisuseError};
pub use primitives::{BsonRead, BsonWrite};
pub use reader::{BsonReader, ReaderState};
pub use settings::{
    ReaderSettings, WriterSettings, DEFAULT_MAX_DOCUMENT_SIZE, DEFAULT_MAX_SERIALIZATION_DEPTH,
};
pub use validator::{
    CollectionElementNameValidator, ElementNameValidator, NoOpElementNameValidator,
    UpdateElementNameValidator,
};
pub use values::{BinaryData, Decimal128, ObjectId, RegularExpression, Timestamp};
pub use writer::{BsonWriter, WriterState};
