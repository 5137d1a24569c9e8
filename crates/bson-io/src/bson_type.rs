//! BSON element type tags and binary subtypes.

use std::fmt;

use crate::error::FormatError;

/// The type tag that precedes every BSON element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BsonType {
    /// Terminates a document or array. Not a value type.
    EndOfDocument = 0x00,
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    Decimal128 = 0x13,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl BsonType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0x00 => BsonType::EndOfDocument,
            0x01 => BsonType::Double,
            0x02 => BsonType::String,
            0x03 => BsonType::Document,
            0x04 => BsonType::Array,
            0x05 => BsonType::Binary,
            0x06 => BsonType::Undefined,
            0x07 => BsonType::ObjectId,
            0x08 => BsonType::Boolean,
            0x09 => BsonType::DateTime,
            0x0A => BsonType::Null,
            0x0B => BsonType::RegularExpression,
            0x0D => BsonType::JavaScript,
            0x0E => BsonType::Symbol,
            0x0F => BsonType::JavaScriptWithScope,
            0x10 => BsonType::Int32,
            0x11 => BsonType::Timestamp,
            0x12 => BsonType::Int64,
            0x13 => BsonType::Decimal128,
            0x7F => BsonType::MaxKey,
            0xFF => BsonType::MinKey,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            BsonType::EndOfDocument => "EndOfDocument",
            BsonType::Double => "Double",
            BsonType::String => "String",
            BsonType::Document => "Document",
            BsonType::Array => "Array",
            BsonType::Binary => "Binary",
            BsonType::Undefined => "Undefined",
            BsonType::ObjectId => "ObjectId",
            BsonType::Boolean => "Boolean",
            BsonType::DateTime => "DateTime",
            BsonType::Null => "Null",
            BsonType::RegularExpression => "RegularExpression",
            BsonType::JavaScript => "JavaScript",
            BsonType::Symbol => "Symbol",
            BsonType::JavaScriptWithScope => "JavaScriptWithScope",
            BsonType::Int32 => "Int32",
            BsonType::Timestamp => "Timestamp",
            BsonType::Int64 => "Int64",
            BsonType::Decimal128 => "Decimal128",
            BsonType::MaxKey => "MaxKey",
            BsonType::MinKey => "MinKey",
        }
    }
}

impl TryFrom<u8> for BsonType {
    type Error = FormatError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        BsonType::from_u8(tag).ok_or(FormatError::UnknownType(tag))
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Subtype byte of a binary element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinarySubtype {
    Generic,
    Function,
    /// Legacy subtype whose payload repeats its own length.
    OldBinary,
    UuidLegacy,
    UuidStandard,
    Md5,
    Encrypted,
    Column,
    Sensitive,
    /// 0x80 to 0xFF.
    UserDefined(u8),
    Other(u8),
}

impl BinarySubtype {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => BinarySubtype::Generic,
            0x01 => BinarySubtype::Function,
            0x02 => BinarySubtype::OldBinary,
            0x03 => BinarySubtype::UuidLegacy,
            0x04 => BinarySubtype::UuidStandard,
            0x05 => BinarySubtype::Md5,
            0x06 => BinarySubtype::Encrypted,
            0x07 => BinarySubtype::Column,
            0x08 => BinarySubtype::Sensitive,
            0x80..=0xFF => BinarySubtype::UserDefined(value),
            _ => BinarySubtype::Other(value),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::OldBinary => 0x02,
            BinarySubtype::UuidLegacy => 0x03,
            BinarySubtype::UuidStandard => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::Encrypted => 0x06,
            BinarySubtype::Column => 0x07,
            BinarySubtype::Sensitive => 0x08,
            BinarySubtype::UserDefined(value) | BinarySubtype::Other(value) => value,
        }
    }
}

impl From<u8> for BinarySubtype {
    fn from(value: u8) -> Self {
        BinarySubtype::from_u8(value)
    }
}

impl From<BinarySubtype> for u8 {
    fn from(subtype: BinarySubtype) -> Self {
        subtype.to_u8()
    }
}
