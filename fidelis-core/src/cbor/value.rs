use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

/// The CBOR data model used by attestation objects and COSE keys.
#[derive(Debug, Clone, PartialEq)]
pub enum CborValue {
    /// Unsigned integer (major type 0), limited to the `i64` range.
    UnsignedInt(u64),
    /// Negative integer (major type 1), stored as its actual value.
    NegativeInt(i64),
    /// Byte string (major type 2).
    ByteString(ByteBuffer),
    /// Text string (major type 3).
    TextString(String),
    /// Array (major type 4).
    Array(Vec<CborValue>),
    /// Map (major type 5), in decode order.
    Map(CborMap),
    /// Half, single or double precision float. Decode only.
    Float(f64),
    Bool(bool),
    Null,
}

impl CborValue {
    /// Create from a signed integer, choosing unsigned or negative encoding.
    pub fn from_int(value: i64) -> Self {
        if value >= 0 {
            CborValue::UnsignedInt(value as u64)
        } else {
            CborValue::NegativeInt(value)
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        CborValue::TextString(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        CborValue::ByteString(ByteBuffer::new(value))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CborValue::UnsignedInt(v) => i64::try_from(*v).ok(),
            CborValue::NegativeInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteBuffer> {
        match self {
            CborValue::ByteString(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CborValue::TextString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[CborValue]> {
        match self {
            CborValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&CborMap> {
        match self {
            CborValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CborValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            CborValue::UnsignedInt(_) | CborValue::NegativeInt(_) => "integer",
            CborValue::ByteString(_) => "byte string",
            CborValue::TextString(_) => "text string",
            CborValue::Array(_) => "array",
            CborValue::Map(_) => "map",
            CborValue::Float(_) => "float",
            CborValue::Bool(_) => "bool",
            CborValue::Null => "null",
        }
    }
}

/// Insertion-ordered CBOR map that never holds two equal keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CborMap {
    entries: Vec<(CborValue, CborValue)>,
}

impl CborMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CborValue, value: CborValue) -> Result<()> {
        if self.get(&key).is_some() {
            return Err(FidelisError::cbor(format!("duplicate key {key:?} in map")));
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Appends an entry whose key the caller has already checked for uniqueness.
    pub(crate) fn push_unique(&mut self, key: CborValue, value: CborValue) {
        self.entries.push((key, value));
    }

    /// Builder-style insert for literal maps.
    pub fn with(mut self, key: CborValue, value: CborValue) -> Result<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &CborValue) -> Option<&CborValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_text_key(&self, key: &str) -> Option<&CborValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn get_int_key(&self, key: i64) -> Option<&CborValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_int() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn contains_text_key(&self, key: &str) -> bool {
        self.get_text_key(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(CborValue, CborValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ========================================================================
    // Typed field access, shared by statement and key parsers
    // ========================================================================

    pub fn require_text(&self, key: &str) -> Result<&str> {
        self.require(key)?.as_text().ok_or_else(|| wrong_type(key, "text string"))
    }

    pub fn require_bytes(&self, key: &str) -> Result<&ByteBuffer> {
        self.require(key)?.as_bytes().ok_or_else(|| wrong_type(key, "byte string"))
    }

    pub fn require_int(&self, key: &str) -> Result<i64> {
        self.require(key)?.as_int().ok_or_else(|| wrong_type(key, "integer"))
    }

    pub fn require_array(&self, key: &str) -> Result<&[CborValue]> {
        self.require(key)?.as_array().ok_or_else(|| wrong_type(key, "array"))
    }

    fn require(&self, key: &str) -> Result<&CborValue> {
        self.get_text_key(key)
            .ok_or_else(|| FidelisError::parse(format!("Missing field '{key}'")))
    }
}

fn wrong_type(key: &str, expected: &str) -> FidelisError {
    FidelisError::parse(format!("Field '{key}' must be a {expected}"))
}
