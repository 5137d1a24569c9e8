//! Push-based streaming BSON writer.

use std::fmt;
use std::sync::Arc;

use bson_io_buffers::{ByteBuffer, ByteSink};
use tracing::debug;

use crate::bson_type::{BinarySubtype, BsonType};
use crate::context::{ContextStack, ContextType};
use crate::error::{BsonError, FormatError, MisuseError};
use crate::primitives::{wire_length, BsonWrite};
use crate::settings::WriterSettings;
use crate::validator::{ElementNameValidator, NoOpElementNameValidator};
use crate::values::{BinaryData, Decimal128, ObjectId, RegularExpression, Timestamp};

/// Where the writer is in the token grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterState {
    /// Nothing written yet.
    Initial,
    /// Expecting an element name (or the end of the document).
    Name,
    /// Expecting a value.
    Value,
    /// Expecting the scope document of a JavaScript-with-scope value.
    ScopeDocument,
    /// A complete top-level document has been written.
    Done,
    Closed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriterState::Initial => "Initial",
            WriterState::Name => "Name",
            WriterState::Value => "Value",
            WriterState::ScopeDocument => "ScopeDocument",
            WriterState::Done => "Done",
            WriterState::Closed => "Closed",
        })
    }
}

const DOCUMENT_STATES: [WriterState; 4] = [
    WriterState::Initial,
    WriterState::Value,
    WriterState::ScopeDocument,
    WriterState::Done,
];

/// Encodes BSON into a [`ByteSink`] from a sequence of typed tokens.
///
/// Length fields are reserved when a document or array starts and
/// backpatched when it ends.
///
/// ```
/// use bson_io::BsonWriter;
/// use bson_io_buffers::{ByteBuffer, ByteBufferStream, MultiChunkBuffer, UnpooledChunkSource};
///
/// let stream = ByteBufferStream::new(MultiChunkBuffer::with_source(UnpooledChunkSource));
/// let mut writer = BsonWriter::new(stream);
/// writer.write_start_document().unwrap();
/// writer.write_name("a").unwrap();
/// writer.write_int32(1).unwrap();
/// writer.write_end_document().unwrap();
/// let bytes = writer.into_inner().buffer().to_vec().unwrap();
/// assert_eq!(bytes, [0x0C, 0, 0, 0, 0x10, b'a', 0, 1, 0, 0, 0, 0]);
/// ```
pub struct BsonWriter<W> {
    sink: W,
    settings: WriterSettings,
    state: WriterState,
    context: ContextStack,
    name: Option<String>,
    serialization_depth: usize,
    max_document_sizes: Vec<usize>,
    validator: Arc<dyn ElementNameValidator>,
    validators: Vec<Arc<dyn ElementNameValidator>>,
    child_validator: Arc<dyn ElementNameValidator>,
}

impl<W: ByteSink> BsonWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_settings(sink, WriterSettings::default())
    }

    pub fn with_settings(sink: W, settings: WriterSettings) -> Self {
        let max_document_size = settings.max_document_size;
        Self {
            sink,
            settings,
            state: WriterState::Initial,
            context: ContextStack::new(),
            name: None,
            serialization_depth: 0,
            max_document_sizes: vec![max_document_size],
            validator: NoOpElementNameValidator::shared(),
            validators: Vec::new(),
            child_validator: NoOpElementNameValidator::shared(),
        }
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Number of documents and arrays currently open.
    pub fn serialization_depth(&self) -> usize {
        self.serialization_depth
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Flushes the sink. Only valid once a top-level document is complete.
    pub fn flush(&mut self) -> Result<(), BsonError> {
        match self.state {
            WriterState::Closed => Err(MisuseError::Closed("writer").into()),
            WriterState::Done => Ok(self.sink.flush()?),
            _ => Err(self.invalid_state("flush", &[WriterState::Done])),
        }
    }

    /// Closes the writer, flushing first when a document is complete.
    /// Never fails; closing again is a no-op.
    pub fn close(&mut self) {
        if self.state == WriterState::Closed {
            return;
        }
        if self.state == WriterState::Done {
            if let Err(err) = self.sink.flush() {
                debug!(error = %err, "flush on close failed");
            }
        }
        self.context = ContextStack::new();
        self.state = WriterState::Closed;
    }

    // -----------------------------------------------------------------------
    // Limits and validation

    /// Tightens the maximum document size until the matching pop. The
    /// effective limit never exceeds the one already in force.
    pub fn push_max_document_size(&mut self, max_document_size: usize) {
        let current = self.max_document_size();
        self.max_document_sizes.push(max_document_size.min(current));
    }

    pub fn pop_max_document_size(&mut self) {
        if self.max_document_sizes.len() > 1 {
            self.max_document_sizes.pop();
        }
    }

    fn max_document_size(&self) -> usize {
        self.max_document_sizes
            .last()
            .copied()
            .unwrap_or(self.settings.max_document_size)
    }

    /// Validates element names with `validator` until the matching pop.
    /// Documents started meanwhile inherit the validator's child rules.
    pub fn push_element_name_validator(&mut self, validator: Arc<dyn ElementNameValidator>) {
        let previous = std::mem::replace(&mut self.validator, validator);
        self.validators.push(previous);
        self.child_validator = self.validator.clone();
    }

    pub fn pop_element_name_validator(&mut self) {
        if let Some(previous) = self.validators.pop() {
            self.validator = previous;
        }
        self.child_validator = self.validator.clone();
    }

    // -----------------------------------------------------------------------
    // Grammar

    pub fn write_name(&mut self, name: &str) -> Result<(), BsonError> {
        if name.as_bytes().contains(&0) {
            return Err(MisuseError::NameContainsNull.into());
        }
        if self.state != WriterState::Name {
            return Err(self.invalid_state("write_name", &[WriterState::Name]));
        }
        if !self.validator.is_valid_element_name(name) {
            return Err(MisuseError::InvalidElementName(name.to_owned()).into());
        }
        self.child_validator = self.validator.child_validator(name);
        self.name = Some(name.to_owned());
        self.state = WriterState::Value;
        Ok(())
    }

    pub fn write_start_document(&mut self) -> Result<(), BsonError> {
        if !DOCUMENT_STATES.contains(&self.state) {
            return Err(self.invalid_state("write_start_document", &DOCUMENT_STATES));
        }
        self.check_depth()?;
        if self.state == WriterState::Value {
            self.write_element_header(BsonType::Document)?;
        }
        let context_type = if self.state == WriterState::ScopeDocument {
            ContextType::ScopeDocument
        } else {
            ContextType::Document
        };
        let start = self.sink.position();
        self.sink.write_i32_le(0)?;
        self.context.push(context_type, start, 0);
        self.serialization_depth += 1;

        let child = self.child_validator.clone();
        self.push_element_name_validator(child);
        self.state = WriterState::Name;
        Ok(())
    }

    pub fn write_end_document(&mut self) -> Result<(), BsonError> {
        if self.state != WriterState::Name {
            return Err(self.invalid_state("write_end_document", &[WriterState::Name]));
        }
        let context_type = self.context.context_type();
        if !matches!(context_type, ContextType::Document | ContextType::ScopeDocument) {
            return Err(MisuseError::InvalidContext {
                method: "write_end_document",
                expected: "Document or ScopeDocument".to_owned(),
                actual: context_type,
            }
            .into());
        }
        self.sink.write_byte(0)?;
        self.backpatch_size()?;
        self.context.pop();
        self.serialization_depth -= 1;
        self.pop_element_name_validator();
        self.finish_value()
    }

    pub fn write_start_array(&mut self) -> Result<(), BsonError> {
        self.verify_value("write_start_array", BsonType::Array)?;
        self.check_depth()?;
        self.write_element_header(BsonType::Array)?;
        let start = self.sink.position();
        self.sink.write_i32_le(0)?;
        self.context.push(ContextType::Array, start, 0);
        self.serialization_depth += 1;
        self.state = WriterState::Value;
        Ok(())
    }

    pub fn write_end_array(&mut self) -> Result<(), BsonError> {
        if self.state != WriterState::Value {
            return Err(self.invalid_state("write_end_array", &[WriterState::Value]));
        }
        let context_type = self.context.context_type();
        if context_type != ContextType::Array {
            return Err(MisuseError::InvalidContext {
                method: "write_end_array",
                expected: "Array".to_owned(),
                actual: context_type,
            }
            .into());
        }
        self.sink.write_byte(0)?;
        self.backpatch_size()?;
        self.context.pop();
        self.serialization_depth -= 1;
        self.state = self.next_state();
        Ok(())
    }

    /// Writes the code of a JavaScript-with-scope value. The scope must be
    /// written next with [`write_start_document`](Self::write_start_document).
    pub fn write_java_script_with_scope(&mut self, code: &str) -> Result<(), BsonError> {
        self.verify_value("write_java_script_with_scope", BsonType::JavaScriptWithScope)?;
        self.write_element_header(BsonType::JavaScriptWithScope)?;
        let start = self.sink.position();
        self.context.push(ContextType::JavaScriptWithScope, start, 0);
        self.sink.write_i32_le(0)?;
        self.sink.write_bson_string(code)?;
        self.state = WriterState::ScopeDocument;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scalars

    pub fn write_double(&mut self, value: f64) -> Result<(), BsonError> {
        self.verify_value("write_double", BsonType::Double)?;
        self.write_element_header(BsonType::Double)?;
        self.sink.write_f64_le(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), BsonError> {
        self.verify_value("write_string", BsonType::String)?;
        self.write_element_header(BsonType::String)?;
        self.sink.write_bson_string(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_symbol(&mut self, value: &str) -> Result<(), BsonError> {
        self.verify_value("write_symbol", BsonType::Symbol)?;
        self.write_element_header(BsonType::Symbol)?;
        self.sink.write_bson_string(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_java_script(&mut self, code: &str) -> Result<(), BsonError> {
        self.verify_value("write_java_script", BsonType::JavaScript)?;
        self.write_element_header(BsonType::JavaScript)?;
        self.sink.write_bson_string(code)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_binary_data(&mut self, data: &BinaryData) -> Result<(), BsonError> {
        self.verify_value("write_binary_data", BsonType::Binary)?;
        let mut subtype = data.subtype;
        if subtype == BinarySubtype::OldBinary && self.settings.fix_old_binary_subtype_on_output {
            subtype = BinarySubtype::Generic;
        }
        self.write_element_header(BsonType::Binary)?;
        let length = wire_length(data.bytes.len())?;
        if subtype == BinarySubtype::OldBinary {
            // The legacy layout repeats the payload length inside the payload.
            let outer = length.checked_add(4).ok_or(FormatError::DocumentTooLarge {
                size: data.bytes.len() + 4,
                max: i32::MAX as usize,
            })?;
            self.sink.write_i32_le(outer)?;
            self.sink.write_byte(subtype.to_u8())?;
            self.sink.write_i32_le(length)?;
        } else {
            self.sink.write_i32_le(length)?;
            self.sink.write_byte(subtype.to_u8())?;
        }
        self.sink.write_all(&data.bytes)?;
        self.state = self.next_state();
        Ok(())
    }

    /// Writes `bytes` as generic binary data.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BsonError> {
        self.verify_value("write_bytes", BsonType::Binary)?;
        self.write_element_header(BsonType::Binary)?;
        self.sink.write_i32_le(wire_length(bytes.len())?)?;
        self.sink.write_byte(BinarySubtype::Generic.to_u8())?;
        self.sink.write_all(bytes)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_undefined(&mut self) -> Result<(), BsonError> {
        self.write_empty("write_undefined", BsonType::Undefined)
    }

    pub fn write_object_id(&mut self, value: &ObjectId) -> Result<(), BsonError> {
        self.verify_value("write_object_id", BsonType::ObjectId)?;
        self.write_element_header(BsonType::ObjectId)?;
        self.sink.write_object_id(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<(), BsonError> {
        self.verify_value("write_boolean", BsonType::Boolean)?;
        self.write_element_header(BsonType::Boolean)?;
        self.sink.write_byte(u8::from(value))?;
        self.state = self.next_state();
        Ok(())
    }

    /// Milliseconds since the Unix epoch.
    pub fn write_date_time(&mut self, value: i64) -> Result<(), BsonError> {
        self.verify_value("write_date_time", BsonType::DateTime)?;
        self.write_element_header(BsonType::DateTime)?;
        self.sink.write_i64_le(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_null(&mut self) -> Result<(), BsonError> {
        self.write_empty("write_null", BsonType::Null)
    }

    pub fn write_regular_expression(&mut self, regex: &RegularExpression) -> Result<(), BsonError> {
        self.verify_value("write_regular_expression", BsonType::RegularExpression)?;
        self.write_element_header(BsonType::RegularExpression)?;
        self.sink.write_cstring(&regex.pattern)?;
        self.sink.write_cstring(&regex.options)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_int32(&mut self, value: i32) -> Result<(), BsonError> {
        self.verify_value("write_int32", BsonType::Int32)?;
        self.write_element_header(BsonType::Int32)?;
        self.sink.write_i32_le(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_timestamp(&mut self, value: Timestamp) -> Result<(), BsonError> {
        self.verify_value("write_timestamp", BsonType::Timestamp)?;
        self.write_element_header(BsonType::Timestamp)?;
        self.sink.write_u64_le(value.to_u64())?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_int64(&mut self, value: i64) -> Result<(), BsonError> {
        self.verify_value("write_int64", BsonType::Int64)?;
        self.write_element_header(BsonType::Int64)?;
        self.sink.write_i64_le(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_decimal128(&mut self, value: &Decimal128) -> Result<(), BsonError> {
        self.verify_value("write_decimal128", BsonType::Decimal128)?;
        self.write_element_header(BsonType::Decimal128)?;
        self.sink.write_decimal128(value)?;
        self.state = self.next_state();
        Ok(())
    }

    pub fn write_min_key(&mut self) -> Result<(), BsonError> {
        self.write_empty("write_min_key", BsonType::MinKey)
    }

    pub fn write_max_key(&mut self) -> Result<(), BsonError> {
        self.write_empty("write_max_key", BsonType::MaxKey)
    }

    // -----------------------------------------------------------------------
    // Raw values

    /// Copies a pre-encoded document verbatim. Valid wherever a document may
    /// start, including the top level.
    pub fn write_raw_document(&mut self, document: &dyn ByteBuffer) -> Result<(), BsonError> {
        if !DOCUMENT_STATES.contains(&self.state) {
            return Err(self.invalid_state("write_raw_document", &DOCUMENT_STATES));
        }
        check_raw_prefix(document)?;
        if self.state == WriterState::Value {
            self.write_element_header(BsonType::Document)?;
        }
        self.sink.write_buffer(document)?;
        if self.context.context_type() == ContextType::JavaScriptWithScope {
            self.backpatch_size()?;
            self.context.pop();
        }
        self.state = self.next_state();
        Ok(())
    }

    /// Copies a pre-encoded array verbatim.
    pub fn write_raw_array(&mut self, array: &dyn ByteBuffer) -> Result<(), BsonError> {
        self.verify_value("write_raw_array", BsonType::Array)?;
        check_raw_prefix(array)?;
        self.write_element_header(BsonType::Array)?;
        self.sink.write_buffer(array)?;
        self.state = self.next_state();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers

    fn write_empty(&mut self, method: &'static str, bson_type: BsonType) -> Result<(), BsonError> {
        self.verify_value(method, bson_type)?;
        self.write_element_header(bson_type)?;
        self.state = self.next_state();
        Ok(())
    }

    fn next_state(&self) -> WriterState {
        match self.context.context_type() {
            ContextType::TopLevel => WriterState::Done,
            ContextType::Array => WriterState::Value,
            _ => WriterState::Name,
        }
    }

    /// Moves on after a value closed a document: a scope document also
    /// closes its enclosing JavaScript-with-scope value.
    fn finish_value(&mut self) -> Result<(), BsonError> {
        if self.context.context_type() == ContextType::JavaScriptWithScope {
            self.backpatch_size()?;
            self.context.pop();
        }
        self.state = self.next_state();
        Ok(())
    }

    fn check_depth(&self) -> Result<(), BsonError> {
        if self.serialization_depth >= self.settings.max_serialization_depth {
            return Err(
                MisuseError::MaxSerializationDepthExceeded(self.settings.max_serialization_depth)
                    .into(),
            );
        }
        Ok(())
    }

    /// Writes the type tag and the element name, or the next index inside
    /// an array.
    fn write_element_header(&mut self, bson_type: BsonType) -> Result<(), BsonError> {
        self.sink.write_byte(bson_type.tag())?;
        if self.context.context_type() == ContextType::Array {
            let frame = self.context.current_mut();
            let index = frame.index;
            frame.index += 1;
            self.sink.write_cstring(&index.to_string())
        } else {
            let name = self.name.take().unwrap_or_default();
            self.sink.write_cstring(&name)
        }
    }

    /// Writes the size of the current frame into its reserved length field.
    fn backpatch_size(&mut self) -> Result<(), BsonError> {
        let frame = *self.context.current();
        let position = self.sink.position();
        let size = position - frame.start_position;
        let max = self.max_document_size();
        if size > max {
            debug!(size, max, context = %frame.context_type, "document exceeds max size");
            return Err(FormatError::DocumentTooLarge { size, max }.into());
        }
        self.sink.seek(frame.start_position)?;
        self.sink.write_i32_le(wire_length(size)?)?;
        self.sink.seek(position)?;
        Ok(())
    }

    fn verify_value(&self, method: &'static str, bson_type: BsonType) -> Result<(), BsonError> {
        match self.state {
            WriterState::Value => Ok(()),
            WriterState::Initial | WriterState::ScopeDocument | WriterState::Done => {
                Err(MisuseError::ValueAtRoot { bson_type }.into())
            }
            _ => Err(self.invalid_state(method, &[WriterState::Value])),
        }
    }

    fn invalid_state(&self, method: &'static str, expected: &[WriterState]) -> BsonError {
        if self.state == WriterState::Closed {
            return MisuseError::Closed("writer").into();
        }
        MisuseError::InvalidState {
            method,
            expected: expected
                .iter()
                .map(WriterState::to_string)
                .collect::<Vec<_>>()
                .join(" or "),
            actual: self.state.to_string(),
        }
        .into()
    }
}

/// Checks that a raw value starts with a length field matching its size.
fn check_raw_prefix(raw: &dyn ByteBuffer) -> Result<(), BsonError> {
    let mut prefix = [0u8; 4];
    raw.get_bytes(0, &mut prefix)?;
    let declared = i32::from_le_bytes(prefix);
    if declared < 5 {
        return Err(FormatError::SizeTooSmall(declared).into());
    }
    if declared as usize != raw.len() {
        return Err(FormatError::SizeMismatch {
            expected: declared as usize,
            actual: raw.len(),
        }
        .into());
    }
    Ok(())
}

impl<W> fmt::Debug for BsonWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BsonWriter")
            .field("state", &self.state)
            .field("depth", &self.serialization_depth)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson_io_buffers::{
        ByteBufferStream, MultiChunkBuffer, SingleChunkBuffer, UnpooledChunkSource,
    };

    type Stream = ByteBufferStream<MultiChunkBuffer>;

    fn writer() -> BsonWriter<Stream> {
        BsonWriter::new(ByteBufferStream::new(MultiChunkBuffer::with_source(
            UnpooledChunkSource,
        )))
    }

    fn bytes(writer: BsonWriter<Stream>) -> Vec<u8> {
        writer.into_inner().buffer().to_vec().unwrap()
    }

    #[test]
    fn test_empty_document() {
        let mut w = writer();
        w.write_start_document().unwrap();
        w.write_end_document().unwrap();
        assert_eq!(w.state(), WriterState::Done);
        assert_eq!(bytes(w), [5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_array_indexes() {
        let mut w = writer();
        w.write_start_document().unwrap();
        w.write_name("x").unwrap();
        w.write_start_array().unwrap();
        w.write_null().unwrap();
        w.write_null().unwrap();
        w.write_end_array().unwrap();
        w.write_end_document().unwrap();
        assert_eq!(
            bytes(w),
            [
                0x13, 0, 0, 0, 0x04, b'x', 0, 0x0B, 0, 0, 0, 0x0A, b'0', 0, 0x0A, b'1', 0, 0, 0,
            ]
        );
    }

    #[test]
    fn test_failed_start_keeps_depth() {
        let buffer = SingleChunkBuffer::from_slice(&[0; 8], false);
        let mut w = BsonWriter::new(ByteBufferStream::new(buffer));
        w.write_start_document().unwrap();
        w.write_name("a").unwrap();
        assert!(w.write_start_document().is_err());
        assert_eq!(w.serialization_depth(), 1);
        assert_eq!(w.state(), WriterState::Value);
        assert!(w.write_start_array().is_err());
        assert_eq!(w.serialization_depth(), 1);
    }

    #[test]
    fn test_value_at_root() {
        let mut w = writer();
        assert_eq!(
            w.write_int32(1).unwrap_err(),
            BsonError::Misuse(MisuseError::ValueAtRoot {
                bson_type: BsonType::Int32
            })
        );
        assert_eq!(w.state(), WriterState::Initial);
    }

    #[test]
    fn test_name_rejects_null() {
        let mut w = writer();
        w.write_start_document().unwrap();
        assert_eq!(
            w.write_name("a\0").unwrap_err(),
            BsonError::Misuse(MisuseError::NameContainsNull)
        );
    }

    #[test]
    fn test_old_binary_layout() {
        let mut w = writer();
        w.write_start_document().unwrap();
        w.write_name("b").unwrap();
        w.write_binary_data(&BinaryData::new(BinarySubtype::OldBinary, vec![7]))
            .unwrap();
        w.write_end_document().unwrap();
        let out = bytes(w);
        assert_eq!(&out[7..17], &[5, 0, 0, 0, 2, 1, 0, 0, 0, 7]);
    }

    #[test]
    fn test_flush_requires_done() {
        let mut w = writer();
        assert!(w.flush().unwrap_err().is_misuse());
        w.write_start_document().unwrap();
        w.write_end_document().unwrap();
        w.flush().unwrap();
        w.close();
        w.close();
        assert_eq!(
            w.flush().unwrap_err(),
            BsonError::Misuse(MisuseError::Closed("writer"))
        );
    }
}
