//! Reader position snapshots.

use crate::bson_type::BsonType;
use crate::context::ContextStack;
use crate::reader::ReaderState;

/// Snapshot of a [`BsonReader`](crate::BsonReader) taken by `get_bookmark`.
///
/// Holds its own copy of the context stack, so reading past the bookmark
/// never changes it and it can be returned to any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsonReaderBookmark {
    pub(crate) state: ReaderState,
    pub(crate) current_bson_type: BsonType,
    pub(crate) current_name: Option<String>,
    pub(crate) context: ContextStack,
    pub(crate) position: usize,
}

impl BsonReaderBookmark {
    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn current_bson_type(&self) -> BsonType {
        self.current_bson_type
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Source position the reader will seek back to.
    pub fn position(&self) -> usize {
        self.position
    }
}
