//! Immutable, bounds-checked byte container.
//!
//! Every binary parser in this crate reads through [`ByteBuffer`]; an
//! out-of-range read is reported as a parse error.

use std::fmt;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{FidelisError, Result};

#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteBuffer {
    data: Vec<u8>,
}

impl ByteBuffer {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        hex::decode(hex_str)
            .map(Self::new)
            .map_err(|e| FidelisError::parse(format!("Invalid hex string: {e}")))
    }

    /// Decodes base64url, with or without padding.
    pub fn from_base64_url(encoded: &str) -> Result<Self> {
        URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map(Self::new)
            .map_err(|e| FidelisError::parse(format!("Invalid base64url data: {e}")))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        STANDARD
            .decode(encoded)
            .map(Self::new)
            .map_err(|e| FidelisError::parse(format!("Invalid base64 data: {e}")))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    pub fn to_base64_url(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.data)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.read::<1>(offset)?[0])
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read::<2>(offset)?))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read::<4>(offset)?))
    }

    pub fn get_u64(&self, offset: usize) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read::<8>(offset)?))
    }

    /// Copies `length` bytes starting at `offset` into a new buffer.
    pub fn get_bytes(&self, offset: usize, length: usize) -> Result<ByteBuffer> {
        self.slice(offset, length).map(ByteBuffer::new)
    }

    /// Borrows `length` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&[u8]> {
        offset
            .checked_add(length)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                FidelisError::parse(format!(
                    "Cannot read {length} bytes at offset {offset}, buffer has {} bytes",
                    self.data.len()
                ))
            })
    }

    fn read<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let bytes = self.slice(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteBuffer({})", self.to_hex())
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_reads() {
        let buf = ByteBuffer::from_hex("0102030405060708090a").unwrap();
        assert_eq!(buf.get_u8(0).unwrap(), 0x01);
        assert_eq!(buf.get_u16(1).unwrap(), 0x0203);
        assert_eq!(buf.get_u32(2).unwrap(), 0x0304_0506);
        assert_eq!(buf.get_u64(2).unwrap(), 0x0304_0506_0708_090a);
    }

    #[test]
    fn test_out_of_range_is_parse_error() {
        let buf = ByteBuffer::new(vec![1, 2, 3]);
        assert!(buf.get_u32(0).is_err(), "4-byte read from 3-byte buffer");
        assert!(buf.get_bytes(2, 2).is_err());
        assert!(buf.get_bytes(usize::MAX, 2).is_err(), "offset overflow");
        assert_eq!(buf.get_bytes(1, 2).unwrap().as_slice(), &[2, 3]);
        assert!(buf.get_bytes(3, 0).unwrap().is_empty());
    }

    #[test]
    fn test_base64url_accepts_padding() {
        let buf = ByteBuffer::from_base64_url("AQI=").unwrap();
        assert_eq!(buf.as_slice(), &[1, 2]);
        assert_eq!(buf.to_base64_url(), "AQI");
    }

    #[test]
    fn test_debug_prints_hex() {
        let buf = ByteBuffer::new(vec![0xde, 0xad]);
        assert_eq!(format!("{buf:?}"), "ByteBuffer(dead)");
    }
}
