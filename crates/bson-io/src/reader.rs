//! Pull-based streaming BSON reader.

use std::fmt;

use bson_io_buffers::{ByteBuffer, ByteSource};
use tracing::debug;

use crate::bookmark::BsonReaderBookmark;
use crate::bson_type::{BinarySubtype, BsonType};
use crate::context::{ContextStack, ContextType};
use crate::error::{BsonError, FormatError, MisuseError};
use crate::primitives::BsonRead;
use crate::settings::ReaderSettings;
use crate::values::{BinaryData, Decimal128, ObjectId, RegularExpression, Timestamp};

/// DateTime value written by old encoders for the maximum date.
const OLD_DATE_TIME_MAX_VALUE: i64 = 253_402_300_800_000;
const DATE_TIME_MAX_VALUE: i64 = 253_402_300_799_999;

/// Where the reader is in the token grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    /// Nothing read yet.
    Initial,
    /// Expecting a type byte (or end of document).
    Type,
    /// Expecting an element name.
    Name,
    /// Expecting a value of the current type.
    Value,
    /// Expecting the scope document of a JavaScript-with-scope value.
    ScopeDocument,
    EndOfDocument,
    EndOfArray,
    /// A complete top-level document has been read.
    Done,
    Closed,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReaderState::Initial => "Initial",
            ReaderState::Type => "Type",
            ReaderState::Name => "Name",
            ReaderState::Value => "Value",
            ReaderState::ScopeDocument => "ScopeDocument",
            ReaderState::EndOfDocument => "EndOfDocument",
            ReaderState::EndOfArray => "EndOfArray",
            ReaderState::Done => "Done",
            ReaderState::Closed => "Closed",
        })
    }
}

fn join_states(states: &[ReaderState]) -> String {
    states
        .iter()
        .map(ReaderState::to_string)
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Decodes BSON from a [`ByteSource`] as a sequence of typed tokens.
///
/// The caller drives the grammar: `read_bson_type`, then `read_name` inside
/// documents, then exactly one value read (or `skip_value`). Calls made in
/// any other order fail with [`BsonError::Misuse`].
///
/// ```
/// use bson_io::{BsonReader, BsonType};
/// use bson_io_buffers::SliceSource;
///
/// let bytes = [0x0C, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0];
/// let mut reader = BsonReader::new(SliceSource::new(&bytes));
/// reader.read_start_document().unwrap();
/// assert_eq!(reader.read_bson_type().unwrap(), BsonType::Int32);
/// assert_eq!(reader.read_name().unwrap(), "a");
/// assert_eq!(reader.read_int32().unwrap(), 1);
/// assert_eq!(reader.read_bson_type().unwrap(), BsonType::EndOfDocument);
/// reader.read_end_document().unwrap();
/// ```
pub struct BsonReader<S> {
    source: S,
    settings: ReaderSettings,
    state: ReaderState,
    current_bson_type: BsonType,
    current_name: Option<String>,
    context: ContextStack,
}

impl<S: ByteSource> BsonReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_settings(source, ReaderSettings::default())
    }

    pub fn with_settings(source: S, settings: ReaderSettings) -> Self {
        Self {
            source,
            settings,
            state: ReaderState::Initial,
            current_bson_type: BsonType::Document,
            current_name: None,
            context: ContextStack::new(),
        }
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn current_bson_type(&self) -> BsonType {
        self.current_bson_type
    }

    /// Name of the element most recently read with [`read_name`](Self::read_name).
    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Kind of structure the reader is currently inside.
    pub fn context_type(&self) -> ContextType {
        self.context.context_type()
    }

    pub fn position(&self) -> usize {
        self.source.position()
    }

    pub fn is_at_end_of_file(&self) -> bool {
        self.source.is_at_end()
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Marks the reader closed. Every later operation fails; closing again
    /// is a no-op.
    pub fn close(&mut self) {
        self.state = ReaderState::Closed;
    }

    // -----------------------------------------------------------------------
    // Bookmarks

    pub fn get_bookmark(&self) -> BsonReaderBookmark {
        BsonReaderBookmark {
            state: self.state,
            current_bson_type: self.current_bson_type,
            current_name: self.current_name.clone(),
            context: self.context.clone(),
            position: self.source.position(),
        }
    }

    /// Restores the reader to `bookmark`. The bookmark itself is unchanged
    /// and may be used again.
    pub fn return_to_bookmark(&mut self, bookmark: &BsonReaderBookmark) -> Result<(), BsonError> {
        self.source.seek(bookmark.position)?;
        self.state = bookmark.state;
        self.current_bson_type = bookmark.current_bson_type;
        self.current_name.clone_from(&bookmark.current_name);
        self.context.clone_from(&bookmark.context);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Grammar

    /// Reads the next type byte.
    ///
    /// In the `Initial`, `Done` and `ScopeDocument` states there is no type
    /// byte on the wire and `Document` is returned without consuming input.
    pub fn read_bson_type(&mut self) -> Result<BsonType, BsonError> {
        match self.state {
            ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument => {
                self.current_bson_type = BsonType::Document;
                self.state = ReaderState::Value;
                return Ok(BsonType::Document);
            }
            ReaderState::Type => {}
            _ => {
                return Err(self.invalid_state(
                    "read_bson_type",
                    &[
                        ReaderState::Initial,
                        ReaderState::Done,
                        ReaderState::ScopeDocument,
                        ReaderState::Type,
                    ],
                ))
            }
        }

        let element_start = self.source.position();
        self.context.current_mut().element_start = Some(element_start);
        let tag = self.decode(|s| Ok(s.read_byte()?))?;
        let bson_type = match BsonType::from_u8(tag) {
            Some(bson_type) => bson_type,
            None => return Err(self.format_error(FormatError::UnknownType(tag))),
        };
        self.current_bson_type = bson_type;

        if bson_type == BsonType::EndOfDocument {
            self.context.current_mut().element_start = None;
            self.state = match self.context.context_type() {
                ContextType::Array => ReaderState::EndOfArray,
                ContextType::Document | ContextType::ScopeDocument => ReaderState::EndOfDocument,
                other => {
                    return Err(self.format_error(FormatError::EndOfDocumentInContext(other)))
                }
            };
            return Ok(bson_type);
        }

        match self.context.context_type() {
            ContextType::Array => {
                // Array element names are the decimal index; nothing to report.
                self.decode(|s| s.skip_cstring())?;
                self.state = ReaderState::Value;
            }
            _ => self.state = ReaderState::Name,
        }
        Ok(bson_type)
    }

    pub fn read_name(&mut self) -> Result<String, BsonError> {
        self.verify_state("read_name", ReaderState::Name)?;
        let name = self.decode(|s| s.read_cstring())?;
        self.current_name = Some(name.clone());
        self.state = ReaderState::Value;
        Ok(name)
    }

    /// Reads the element name and fails with a format error unless it is
    /// `expected`.
    pub fn read_name_expecting(&mut self, expected: &str) -> Result<(), BsonError> {
        let actual = self.read_name()?;
        if actual != expected {
            return Err(self.format_error(FormatError::UnexpectedElementName {
                expected: expected.to_owned(),
                actual,
            }));
        }
        Ok(())
    }

    pub fn skip_name(&mut self) -> Result<(), BsonError> {
        self.verify_state("skip_name", ReaderState::Name)?;
        self.decode(|s| s.skip_cstring())?;
        self.current_name = None;
        self.state = ReaderState::Value;
        Ok(())
    }

    pub fn read_start_document(&mut self) -> Result<(), BsonError> {
        self.verify_structure("read_start_document", BsonType::Document)?;
        let start = self.source.position();
        let size = self.read_document_size()?;
        let context_type = if self.context.context_type() == ContextType::JavaScriptWithScope {
            ContextType::ScopeDocument
        } else {
            ContextType::Document
        };
        self.context.push(context_type, start, size);
        self.state = ReaderState::Type;
        Ok(())
    }

    pub fn read_end_document(&mut self) -> Result<(), BsonError> {
        let context_type = self.context.context_type();
        if !matches!(context_type, ContextType::Document | ContextType::ScopeDocument) {
            return Err(self.invalid_context(
                "read_end_document",
                "Document or ScopeDocument",
                context_type,
            ));
        }
        self.verify_state("read_end_document", ReaderState::EndOfDocument)?;
        self.pop_context()?;
        self.leave_scope()?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn read_start_array(&mut self) -> Result<(), BsonError> {
        self.verify_value("read_start_array", BsonType::Array)?;
        let start = self.source.position();
        let size = self.read_document_size()?;
        self.context.push(ContextType::Array, start, size);
        self.state = ReaderState::Type;
        Ok(())
    }

    pub fn read_end_array(&mut self) -> Result<(), BsonError> {
        let context_type = self.context.context_type();
        if context_type != ContextType::Array {
            return Err(self.invalid_context("read_end_array", "Array", context_type));
        }
        self.verify_state("read_end_array", ReaderState::EndOfArray)?;
        self.pop_context()?;
        self.state = self.next_state();
        Ok(())
    }

    /// Reads the code of a JavaScript-with-scope value. The scope follows
    /// and must be read with [`read_start_document`](Self::read_start_document).
    pub fn read_java_script_with_scope(&mut self) -> Result<String, BsonError> {
        self.verify_value("read_java_script_with_scope", BsonType::JavaScriptWithScope)?;
        let start = self.source.position();
        let size = self.read_size()?;
        self.context.push(ContextType::JavaScriptWithScope, start, size);
        let code = self.decode(|s| s.read_bson_string())?;
        self.state = ReaderState::ScopeDocument;
        Ok(code)
    }

    // -----------------------------------------------------------------------
    // Scalars

    pub fn read_double(&mut self) -> Result<f64, BsonError> {
        self.verify_value("read_double", BsonType::Double)?;
        let value = self.decode(|s| s.read_f64_le())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_string(&mut self) -> Result<String, BsonError> {
        self.verify_value("read_string", BsonType::String)?;
        let value = self.decode(|s| s.read_bson_string())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_symbol(&mut self) -> Result<String, BsonError> {
        self.verify_value("read_symbol", BsonType::Symbol)?;
        let value = self.decode(|s| s.read_bson_string())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_java_script(&mut self) -> Result<String, BsonError> {
        self.verify_value("read_java_script", BsonType::JavaScript)?;
        let value = self.decode(|s| s.read_bson_string())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_binary_data(&mut self) -> Result<BinaryData, BsonError> {
        self.verify_value("read_binary_data", BsonType::Binary)?;
        let data = self.read_binary_payload()?;
        self.state = self.next_state();
        Ok(data)
    }

    /// Reads a binary value whose subtype is generic or old binary.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, BsonError> {
        self.verify_value("read_bytes", BsonType::Binary)?;
        let data = self.read_binary_payload()?;
        if !matches!(data.subtype, BinarySubtype::Generic | BinarySubtype::OldBinary) {
            return Err(self.format_error(FormatError::InvalidBytesSubtype(data.subtype)));
        }
        self.state = self.next_state();
        Ok(data.bytes)
    }

    pub fn read_undefined(&mut self) -> Result<(), BsonError> {
        self.verify_value("read_undefined", BsonType::Undefined)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn read_object_id(&mut self) -> Result<ObjectId, BsonError> {
        self.verify_value("read_object_id", BsonType::ObjectId)?;
        let value = self.decode(|s| s.read_object_id())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_boolean(&mut self) -> Result<bool, BsonError> {
        self.verify_value("read_boolean", BsonType::Boolean)?;
        let value = match self.decode(|s| Ok(s.read_byte()?))? {
            0 => false,
            1 => true,
            other => return Err(self.format_error(FormatError::InvalidBoolean(other))),
        };
        self.state = self.next_state();
        Ok(value)
    }

    /// Milliseconds since the Unix epoch.
    pub fn read_date_time(&mut self) -> Result<i64, BsonError> {
        self.verify_value("read_date_time", BsonType::DateTime)?;
        let mut value = self.decode(|s| s.read_i64_le())?;
        if value == OLD_DATE_TIME_MAX_VALUE && self.settings.fix_old_date_time_max_value_on_input {
            value = DATE_TIME_MAX_VALUE;
        }
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_null(&mut self) -> Result<(), BsonError> {
        self.verify_value("read_null", BsonType::Null)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn read_regular_expression(&mut self) -> Result<RegularExpression, BsonError> {
        self.verify_value("read_regular_expression", BsonType::RegularExpression)?;
        let pattern = self.decode(|s| s.read_cstring())?;
        let options = self.decode(|s| s.read_cstring())?;
        self.state = self.next_state();
        Ok(RegularExpression { pattern, options })
    }

    pub fn read_int32(&mut self) -> Result<i32, BsonError> {
        self.verify_value("read_int32", BsonType::Int32)?;
        let value = self.decode(|s| s.read_i32_le())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_timestamp(&mut self) -> Result<Timestamp, BsonError> {
        self.verify_value("read_timestamp", BsonType::Timestamp)?;
        let value = self.decode(|s| s.read_u64_le())?;
        self.state = self.next_state();
        Ok(Timestamp::from_u64(value))
    }

    pub fn read_int64(&mut self) -> Result<i64, BsonError> {
        self.verify_value("read_int64", BsonType::Int64)?;
        let value = self.decode(|s| s.read_i64_le())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_decimal128(&mut self) -> Result<Decimal128, BsonError> {
        self.verify_value("read_decimal128", BsonType::Decimal128)?;
        let value = self.decode(|s| s.read_decimal128())?;
        self.state = self.next_state();
        Ok(value)
    }

    pub fn read_min_key(&mut self) -> Result<(), BsonError> {
        self.verify_value("read_min_key", BsonType::MinKey)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn read_max_key(&mut self) -> Result<(), BsonError> {
        self.verify_value("read_max_key", BsonType::MaxKey)?;
        self.state = self.next_state();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw values and skipping

    /// Returns the current document, length prefix and terminator included,
    /// as a read-only buffer without decoding it. Zero-copy when the source
    /// is backed by a read-only buffer.
    pub fn read_raw_document(&mut self) -> Result<Box<dyn ByteBuffer>, BsonError> {
        self.verify_structure("read_raw_document", BsonType::Document)?;
        let slice = self.read_raw_slice()?;
        self.leave_scope()?;
        self.state = self.next_state();
        Ok(slice)
    }

    /// Array counterpart of [`read_raw_document`](Self::read_raw_document).
    pub fn read_raw_array(&mut self) -> Result<Box<dyn ByteBuffer>, BsonError> {
        self.verify_value("read_raw_array", BsonType::Array)?;
        let slice = self.read_raw_slice()?;
        self.state = self.next_state();
        Ok(slice)
    }

    /// Skips the current value without decoding it.
    pub fn skip_value(&mut self) -> Result<(), BsonError> {
        self.verify_state("skip_value", ReaderState::Value)?;
        let skip = match self.current_bson_type {
            BsonType::Array | BsonType::Document | BsonType::JavaScriptWithScope => {
                self.read_size()?.saturating_sub(4)
            }
            BsonType::Binary => self.read_size()? + 1,
            BsonType::String | BsonType::JavaScript | BsonType::Symbol => self.read_size()?,
            BsonType::Boolean => 1,
            BsonType::Int32 => 4,
            BsonType::DateTime | BsonType::Double | BsonType::Int64 | BsonType::Timestamp => 8,
            BsonType::ObjectId => 12,
            BsonType::Decimal128 => 16,
            BsonType::MinKey | BsonType::MaxKey | BsonType::Null | BsonType::Undefined => 0,
            BsonType::RegularExpression => {
                self.decode(|s| s.skip_cstring())?;
                self.decode(|s| s.skip_cstring())?;
                0
            }
            BsonType::EndOfDocument => {
                return Err(self.invalid_state("skip_value", &[ReaderState::Value]))
            }
        };
        self.decode(|s| Ok(s.skip(skip)?))?;
        if self.current_bson_type == BsonType::Document {
            self.leave_scope()?;
        }
        self.state = self.next_state();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookahead

    /// Advances through the current document until an element called `name`
    /// is found, leaving the reader ready to read its value. Returns `false`
    /// (with the end of document consumed) when there is no such element.
    pub fn find_element(&mut self, name: &str) -> Result<bool, BsonError> {
        while self.read_bson_type()? != BsonType::EndOfDocument {
            if self.read_name()? == name {
                return Ok(true);
            }
            self.skip_value()?;
        }
        Ok(false)
    }

    /// Like [`find_element`](Self::find_element) but only matches string
    /// elements, returning their value.
    pub fn find_string_element(&mut self, name: &str) -> Result<Option<String>, BsonError> {
        loop {
            match self.read_bson_type()? {
                BsonType::EndOfDocument => return Ok(None),
                BsonType::String => {
                    if self.read_name()? == name {
                        return self.read_string().map(Some);
                    }
                }
                _ => self.skip_name()?,
            }
            self.skip_value()?;
        }
    }

    // -----------------------------------------------------------------------
    // Helpers

    fn next_state(&self) -> ReaderState {
        match self.context.context_type() {
            ContextType::TopLevel => ReaderState::Done,
            _ => ReaderState::Type,
        }
    }

    /// Runs a primitive decode against the source, attaching the element
    /// path to any format error.
    fn decode<T>(
        &mut self,
        f: impl FnOnce(&mut S) -> Result<T, BsonError>,
    ) -> Result<T, BsonError> {
        match f(&mut self.source) {
            Ok(value) => Ok(value),
            Err(BsonError::Format { error, path: None }) => Err(self.format_error(error)),
            Err(err) => Err(err),
        }
    }

    fn format_error(&mut self, error: FormatError) -> BsonError {
        let path = self.element_path();
        debug!(error = %error, path = ?path, position = self.source.position(), "malformed BSON");
        BsonError::Format { error, path }
    }

    /// Builds a dotted path by re-reading the name of the element currently
    /// open in each context frame. Best effort: stops at the first name that
    /// cannot be read.
    fn element_path(&mut self) -> Option<String> {
        let starts: Vec<usize> = self
            .context
            .frames()
            .iter()
            .filter_map(|frame| frame.element_start)
            .collect();
        if starts.is_empty() {
            return None;
        }
        let saved = self.source.position();
        let mut names = Vec::with_capacity(starts.len());
        for start in starts {
            if self.source.seek(start + 1).is_err() {
                break;
            }
            match self.source.read_cstring() {
                Ok(name) => names.push(name),
                Err(_) => break,
            }
        }
        if self.source.seek(saved).is_err() {
            debug!(position = saved, "could not restore position after building element path");
        }
        if names.is_empty() {
            None
        } else {
            Some(names.join("."))
        }
    }

    fn invalid_state(&self, method: &'static str, expected: &[ReaderState]) -> BsonError {
        if self.state == ReaderState::Closed {
            return MisuseError::Closed("reader").into();
        }
        MisuseError::InvalidState {
            method,
            expected: join_states(expected),
            actual: self.state.to_string(),
        }
        .into()
    }

    fn invalid_context(
        &self,
        method: &'static str,
        expected: &str,
        actual: ContextType,
    ) -> BsonError {
        if self.state == ReaderState::Closed {
            return MisuseError::Closed("reader").into();
        }
        MisuseError::InvalidContext {
            method,
            expected: expected.to_owned(),
            actual,
        }
        .into()
    }

    fn verify_state(&self, method: &'static str, expected: ReaderState) -> Result<(), BsonError> {
        if self.state != expected {
            return Err(self.invalid_state(method, &[expected]));
        }
        Ok(())
    }

    /// Requires the `Value` state with `expected` as the current type.
    fn verify_value(&self, method: &'static str, expected: BsonType) -> Result<(), BsonError> {
        self.verify_state(method, ReaderState::Value)?;
        if self.current_bson_type != expected {
            return Err(MisuseError::TypeMismatch {
                method,
                expected,
                actual: self.current_bson_type,
            }
            .into());
        }
        Ok(())
    }

    /// Like `verify_value`, but a document may also start where no type byte
    /// precedes it (top level or a scope document).
    fn verify_structure(&mut self, method: &'static str, expected: BsonType) -> Result<(), BsonError> {
        match self.state {
            ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument => {
                self.current_bson_type = BsonType::Document;
                self.state = ReaderState::Value;
                Ok(())
            }
            ReaderState::Value => self.verify_value(method, expected),
            _ => Err(self.invalid_state(
                method,
                &[
                    ReaderState::Initial,
                    ReaderState::Done,
                    ReaderState::ScopeDocument,
                    ReaderState::Value,
                ],
            )),
        }
    }

    /// Reads a length field, rejecting negative sizes and sizes above the
    /// configured maximum.
    fn read_size(&mut self) -> Result<usize, BsonError> {
        let size = self.decode(|s| s.read_i32_le())?;
        if size < 0 {
            return Err(self.format_error(FormatError::NegativeSize(size)));
        }
        let size = size as usize;
        if size > self.settings.max_document_size {
            return Err(self.format_error(FormatError::SizeTooLarge {
                size,
                max: self.settings.max_document_size,
            }));
        }
        Ok(size)
    }

    fn read_document_size(&mut self) -> Result<usize, BsonError> {
        let size = self.read_size()?;
        if size < 5 {
            return Err(self.format_error(FormatError::SizeTooSmall(size as i32)));
        }
        Ok(size)
    }

    fn pop_context(&mut self) -> Result<(), BsonError> {
        let position = self.source.position();
        match self.context.pop_checked(position) {
            Ok(_) => Ok(()),
            Err(error) => Err(self.format_error(error)),
        }
    }

    /// Closes the enclosing JavaScript-with-scope value once its scope
    /// document has been consumed.
    fn leave_scope(&mut self) -> Result<(), BsonError> {
        if self.context.context_type() == ContextType::JavaScriptWithScope {
            self.pop_context()?;
        }
        Ok(())
    }

    fn read_binary_payload(&mut self) -> Result<BinaryData, BsonError> {
        let mut size = self.read_size()?;
        let mut subtype = BinarySubtype::from_u8(self.decode(|s| Ok(s.read_byte()?))?);
        if subtype == BinarySubtype::OldBinary {
            let inner = self.decode(|s| s.read_i32_le())?;
            let expected = size as i64 - 4;
            if size < 4 || inner as i64 != expected {
                return Err(self.format_error(FormatError::OldBinarySizeMismatch { inner, expected }));
            }
            size -= 4;
            if self.settings.fix_old_binary_subtype_on_input {
                subtype = BinarySubtype::Generic;
            }
        }
        let bytes = self.decode(|s| s.read_vec(size))?;
        Ok(BinaryData { subtype, bytes })
    }

    fn read_raw_slice(&mut self) -> Result<Box<dyn ByteBuffer>, BsonError> {
        let start = self.source.position();
        let size = self.read_document_size()?;
        if start + size > self.source.len() {
            return Err(self.format_error(FormatError::EndOfStream));
        }
        let slice = self.source.slice(start, size)?;
        self.source.seek(start + size)?;
        Ok(slice)
    }
}

impl<S> fmt::Debug for BsonReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BsonReader")
            .field("state", &self.state)
            .field("current_bson_type", &self.current_bson_type)
            .field("current_name", &self.current_name)
            .field("depth", &self.context.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_io_buffers::SliceSource;

    fn reader(bytes: &[u8]) -> BsonReader<SliceSource<'_>> {
        BsonReader::new(SliceSource::new(bytes))
    }

    // {"a": true}
    const BOOL_DOC: [u8; 9] = [0x09, 0, 0, 0, 0x08, b'a', 0, 0x01, 0];

    #[test]
    fn test_implicit_document_type() {
        let mut r = reader(&BOOL_DOC);
        assert_eq!(r.read_bson_type().unwrap(), BsonType::Document);
        assert_eq!(r.position(), 0);
        r.read_start_document().unwrap();
        assert_eq!(r.state(), ReaderState::Type);
    }

    #[test]
    fn test_scalar_requires_value_state() {
        let mut r = reader(&BOOL_DOC);
        r.read_start_document().unwrap();
        let err = r.read_boolean().unwrap_err();
        assert!(err.is_misuse());
        r.read_bson_type().unwrap();
        assert!(r.read_boolean().unwrap_err().is_misuse());
        r.read_name().unwrap();
        assert!(r.read_boolean().unwrap());
    }

    #[test]
    fn test_type_mismatch() {
        let mut r = reader(&BOOL_DOC);
        r.read_start_document().unwrap();
        r.read_bson_type().unwrap();
        r.read_name().unwrap();
        assert_eq!(
            r.read_int32().unwrap_err(),
            BsonError::Misuse(MisuseError::TypeMismatch {
                method: "read_int32",
                expected: BsonType::Int32,
                actual: BsonType::Boolean,
            })
        );
    }

    #[test]
    fn test_invalid_boolean_byte() {
        let mut bytes = BOOL_DOC;
        bytes[7] = 2;
        let mut r = reader(&bytes);
        r.read_start_document().unwrap();
        r.read_bson_type().unwrap();
        r.read_name().unwrap();
        let err = r.read_boolean().unwrap_err();
        assert_eq!(err.format_error(), Some(&FormatError::InvalidBoolean(2)));
        assert_eq!(err.path(), Some("a"));
    }

    #[test]
    fn test_unknown_type_reports_name() {
        let bytes = [0x09, 0, 0, 0, 0x42, b'z', 0, 0x01, 0];
        let mut r = reader(&bytes);
        r.read_start_document().unwrap();
        let err = r.read_bson_type().unwrap_err();
        assert_eq!(err.format_error(), Some(&FormatError::UnknownType(0x42)));
        assert_eq!(err.path(), Some("z"));
        assert_eq!(r.position(), 5);
    }

    #[test]
    fn test_end_of_document_at_top_level_state() {
        let mut r = reader(&BOOL_DOC);
        r.read_start_document().unwrap();
        assert!(r.read_end_document().unwrap_err().is_misuse());
    }

    #[test]
    fn test_read_name_expecting() {
        let mut r = reader(&BOOL_DOC);
        r.read_start_document().unwrap();
        r.read_bson_type().unwrap();
        let err = r.read_name_expecting("b").unwrap_err();
        assert!(matches!(
            err.format_error(),
            Some(FormatError::UnexpectedElementName { .. })
        ));
    }

    #[test]
    fn test_date_time_fix() {
        let mut bytes = vec![0x10, 0, 0, 0, 0x09, b'd', 0];
        bytes.extend_from_slice(&OLD_DATE_TIME_MAX_VALUE.to_le_bytes());
        bytes.push(0);
        let settings = ReaderSettings {
            fix_old_date_time_max_value_on_input: true,
            ..ReaderSettings::default()
        };
        let mut r = BsonReader::with_settings(SliceSource::new(&bytes), settings);
        r.read_start_document().unwrap();
        r.read_bson_type().unwrap();
        r.read_name().unwrap();
        assert_eq!(r.read_date_time().unwrap(), DATE_TIME_MAX_VALUE);

        let mut r = reader(&bytes);
        r.read_start_document().unwrap();
        r.read_bson_type().unwrap();
        r.read_name().unwrap();
        assert_eq!(r.read_date_time().unwrap(), OLD_DATE_TIME_MAX_VALUE);
    }

    #[test]
    fn test_closed_reader() {
        let mut r = reader(&BOOL_DOC);
        r.close();
        r.close();
        assert_eq!(
            r.read_bson_type().unwrap_err(),
            BsonError::Misuse(MisuseError::Closed("reader"))
        );
    }
}
