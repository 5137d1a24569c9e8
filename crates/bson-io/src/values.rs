//! Small BSON value types with a fixed wire layout.

use std::fmt;

use crate::bson_type::BinarySubtype;

/// A 12-byte object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Seconds since the Unix epoch stored in the leading four bytes
    /// (big-endian).
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }
}

/// IEEE 754-2008 128-bit decimal, kept as its raw bit halves.
///
/// On the wire the low half comes first, each half little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal128 {
    high: u64,
    low: u64,
}

impl Decimal128 {
    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut low = [0u8; 8];
        let mut high = [0u8; 8];
        low.copy_from_slice(&bytes[..8]);
        high.copy_from_slice(&bytes[8..]);
        Self {
            high: u64::from_le_bytes(high),
            low: u64::from_le_bytes(low),
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.low.to_le_bytes());
        bytes[8..].copy_from_slice(&self.high.to_le_bytes());
        bytes
    }

    pub const fn high(&self) -> u64 {
        self.high
    }

    pub const fn low(&self) -> u64 {
        self.low
    }
}

/// Binary payload with its subtype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryData {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl BinaryData {
    pub fn new(subtype: BinarySubtype, bytes: Vec<u8>) -> Self {
        Self { subtype, bytes }
    }

    pub fn generic(bytes: Vec<u8>) -> Self {
        Self::new(BinarySubtype::Generic, bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RegularExpression {
    pub pattern: String,
    pub options: String,
}

impl RegularExpression {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// Internal replication timestamp: seconds in the high word, an ordinal in
/// the low word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

impl Timestamp {
    pub const fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }

    pub const fn from_u64(value: u64) -> Self {
        Self {
            time: (value >> 32) as u32,
            increment: value as u32,
        }
    }

    pub const fn to_u64(self) -> u64 {
        ((self.time as u64) << 32) | self.increment as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_hex() {
        let oid = ObjectId::from_bytes([0x5f, 0, 0, 1, 0xab, 0xcd, 0, 0, 0, 0, 0, 0xff]);
        assert_eq!(oid.to_hex(), "5f000001abcd0000000000ff");
        assert_eq!(oid.timestamp(), 0x5f000001);
    }

    #[test]
    fn test_decimal128_halves() {
        let value = Decimal128::from_parts(0x3040_0000_0000_0000, 1);
        let bytes = value.to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[15], 0x30);
        assert_eq!(Decimal128::from_bytes(bytes), value);
    }

    #[test]
    fn test_timestamp_words() {
        let ts = Timestamp::new(7, 3);
        assert_eq!(ts.to_u64(), (7u64 << 32) | 3);
        assert_eq!(Timestamp::from_u64(ts.to_u64()), ts);
    }
}
