//! Error taxonomy for BSON reading and writing.

use bson_io_buffers::BufferError;
use thiserror::Error;

use crate::bson_type::{BinarySubtype, BsonType};
use crate::context::ContextType;

/// Malformed input data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("detected unknown BSON type 0x{0:02X}")]
    UnknownType(u8),
    #[error("size {0} is not valid because it is negative")]
    NegativeSize(i32),
    #[error("size {size} is not valid because it is larger than max document size {max}")]
    SizeTooLarge { size: usize, max: usize },
    #[error("size {0} is smaller than the minimum document size of 5")]
    SizeTooSmall(i32),
    #[error("expected size to be {expected}, not {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("string is missing its null terminator")]
    MissingNullTerminator,
    #[error("invalid string length {0}")]
    InvalidStringLength(i32),
    #[error("invalid boolean byte 0x{0:02X}")]
    InvalidBoolean(u8),
    #[error("unexpected end of input")]
    EndOfStream,
    #[error("invalid UTF-8")]
    InvalidUtf8,
    #[error("end of document found in {0} context")]
    EndOfDocumentInContext(ContextType),
    #[error("binary data of subtype old binary has inner length {inner}, expected {expected}")]
    OldBinarySizeMismatch { inner: i32, expected: i64 },
    #[error("expected element name to be '{expected}', not '{actual}'")]
    UnexpectedElementName { expected: String, actual: String },
    #[error("size {size} is larger than max document size {max}")]
    DocumentTooLarge { size: usize, max: usize },
    #[error("binary subtype {0:?} cannot be read as plain bytes")]
    InvalidBytesSubtype(BinarySubtype),
}

/// Calls made in the wrong order or with invalid arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MisuseError {
    #[error("{method} can only be called when state is {expected}, not when state is {actual}")]
    InvalidState {
        method: &'static str,
        expected: String,
        actual: String,
    },
    #[error("{method} can only be called when context type is {expected}, not when context type is {actual}")]
    InvalidContext {
        method: &'static str,
        expected: String,
        actual: ContextType,
    },
    #[error("{method} can only be called when current BSON type is {expected}, not when current BSON type is {actual}")]
    TypeMismatch {
        method: &'static str,
        expected: BsonType,
        actual: BsonType,
    },
    #[error("{} {bson_type} value cannot be written to the root level of a BSON document", article(.bson_type))]
    ValueAtRoot { bson_type: BsonType },
    #[error("maximum serialization depth of {0} exceeded")]
    MaxSerializationDepthExceeded(usize),
    #[error("element name '{0}' is not valid")]
    InvalidElementName(String),
    #[error("element names cannot contain null bytes")]
    NameContainsNull,
    #[error("C-strings cannot contain null bytes")]
    CStringContainsNull,
    #[error("the {0} has been closed")]
    Closed(&'static str),
}

fn article(bson_type: &BsonType) -> &'static str {
    match bson_type.name().as_bytes().first() {
        Some(b'A' | b'E' | b'I' | b'O' | b'U') => "An",
        _ => "A",
    }
}

/// Error returned by every reader and writer operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BsonError {
    /// Malformed data, with the dotted element path where it was found.
    #[error("{error}{}", at_path(.path))]
    Format {
        error: FormatError,
        path: Option<String>,
    },
    #[error(transparent)]
    Misuse(#[from] MisuseError),
    #[error(transparent)]
    Buffer(BufferError),
}

fn at_path(path: &Option<String>) -> String {
    match path {
        Some(path) => format!(" (element '{path}')"),
        None => String::new(),
    }
}

impl BsonError {
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            BsonError::Format { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn misuse_error(&self) -> Option<&MisuseError> {
        match self {
            BsonError::Misuse(error) => Some(error),
            _ => None,
        }
    }

    /// Dotted path of the element being decoded when a format error occurred.
    pub fn path(&self) -> Option<&str> {
        match self {
            BsonError::Format { path, .. } => path.as_deref(),
            _ => None,
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, BsonError::Format { .. })
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, BsonError::Misuse(_))
    }
}

impl From<FormatError> for BsonError {
    fn from(error: FormatError) -> Self {
        BsonError::Format { error, path: None }
    }
}

impl From<BufferError> for BsonError {
    fn from(error: BufferError) -> Self {
        match error {
            // Running out of input while decoding means the data is truncated.
            BufferError::EndOfStream => FormatError::EndOfStream.into(),
            other => BsonError::Buffer(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_stream_is_format_error() {
        let err: BsonError = BufferError::EndOfStream.into();
        assert_eq!(err.format_error(), Some(&FormatError::EndOfStream));
        let err: BsonError = BufferError::ReadOnly.into();
        assert_eq!(err, BsonError::Buffer(BufferError::ReadOnly));
    }

    #[test]
    fn test_display_includes_path() {
        let err = BsonError::Format {
            error: FormatError::InvalidBoolean(2),
            path: Some("a.b.0".into()),
        };
        assert_eq!(err.to_string(), "invalid boolean byte 0x02 (element 'a.b.0')");
        assert_eq!(err.path(), Some("a.b.0"));
    }

    #[test]
    fn test_value_at_root_article() {
        let err = MisuseError::ValueAtRoot {
            bson_type: BsonType::Int32,
        };
        assert_eq!(
            err.to_string(),
            "An Int32 value cannot be written to the root level of a BSON document"
        );
        let err = MisuseError::ValueAtRoot {
            bson_type: BsonType::Boolean,
        };
        assert!(err.to_string().starts_with("A Boolean value"));
    }
}
