//! Reader and writer configuration.

use serde::{Deserialize, Serialize};

/// Largest document size the wire format can express.
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = i32::MAX as usize;

pub const DEFAULT_MAX_SERIALIZATION_DEPTH: usize = 100;

/// Settings for [`BsonReader`](crate::BsonReader).
///
/// Fields missing from a serialized form fall back to their defaults:
///
/// ```
/// use bson_io::ReaderSettings;
///
/// let settings = ReaderSettings::from_json(r#"{"max_document_size": 1024}"#).unwrap();
/// assert_eq!(settings.max_document_size, 1024);
/// assert!(!settings.fix_old_binary_subtype_on_input);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Upper bound for every length field read from the input.
    pub max_document_size: usize,
    /// Report binary subtype 0x02 as the generic subtype.
    pub fix_old_binary_subtype_on_input: bool,
    /// Read DateTime 253402300800000 as 253402300799999, undoing an old
    /// encoder's off-by-one for the maximum date.
    pub fix_old_date_time_max_value_on_input: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            fix_old_binary_subtype_on_input: false,
            fix_old_date_time_max_value_on_input: false,
        }
    }
}

impl ReaderSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Settings for [`BsonWriter`](crate::BsonWriter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Largest document the writer will close; checked when each document
    /// or array is backpatched.
    pub max_document_size: usize,
    /// Maximum nesting of documents and arrays.
    pub max_serialization_depth: usize,
    /// Write the legacy old binary subtype as the generic subtype.
    pub fix_old_binary_subtype_on_output: bool,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_serialization_depth: DEFAULT_MAX_SERIALIZATION_DEPTH,
            fix_old_binary_subtype_on_output: false,
        }
    }
}

impl WriterSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
