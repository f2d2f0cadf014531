//! Canonical CBOR encoder (RFC 7049 section 3.9).
//!
//! Integers and lengths use the shortest form and map entries are sorted by
//! encoded key, shorter keys first, then bytewise.

use super::value::CborValue;
use super::{
    MT_ARRAY, MT_BYTE_STRING, MT_MAP, MT_NEGATIVE, MT_SIMPLE, MT_TEXT_STRING, MT_UNSIGNED,
};
use crate::error::{FidelisError, Result};

/// Encode a value to its canonical byte form.
pub fn encode(value: &CborValue) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    encode_item(&mut buf, value)?;
    Ok(buf)
}

fn encode_item(buf: &mut Vec<u8>, value: &CborValue) -> Result<()> {
    match value {
        CborValue::UnsignedInt(v) => encode_type_and_length(buf, MT_UNSIGNED, *v),
        CborValue::NegativeInt(v) => {
            if *v >= 0 {
                return Err(FidelisError::cbor(format!(
                    "negative integer variant holds non-negative value {v}"
                )));
            }
            encode_type_and_length(buf, MT_NEGATIVE, (-1 - *v) as u64)
        }
        CborValue::ByteString(bytes) => {
            encode_type_and_length(buf, MT_BYTE_STRING, bytes.len() as u64);
            buf.extend_from_slice(bytes.as_slice());
        }
        CborValue::TextString(s) => {
            encode_type_and_length(buf, MT_TEXT_STRING, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        CborValue::Array(items) => {
            encode_type_and_length(buf, MT_ARRAY, items.len() as u64);
            for item in items {
                encode_item(buf, item)?;
            }
        }
        CborValue::Map(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map.iter() {
                entries.push((encode(key)?, value));
            }
            entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
            if entries.windows(2).any(|pair| pair[0].0 == pair[1].0) {
                return Err(FidelisError::cbor("duplicate key in map"));
            }

            encode_type_and_length(buf, MT_MAP, entries.len() as u64);
            for (key, value) in entries {
                buf.extend_from_slice(&key);
                encode_item(buf, value)?;
            }
        }
        CborValue::Float(_) => {
            return Err(FidelisError::unsupported("encoding floats is not supported"))
        }
        CborValue::Bool(false) => buf.push((MT_SIMPLE << 5) | 20),
        CborValue::Bool(true) => buf.push((MT_SIMPLE << 5) | 21),
        CborValue::Null => buf.push((MT_SIMPLE << 5) | 22),
    }
    Ok(())
}

/// Writes the initial byte and the minimal-length argument.
fn encode_type_and_length(buf: &mut Vec<u8>, major_type: u8, value: u64) {
    let mt = major_type << 5;
    if value < 24 {
        buf.push(mt | value as u8);
    } else if value <= u8::MAX as u64 {
        buf.push(mt | 24);
        buf.push(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.push(mt | 25);
        buf.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        buf.push(mt | 26);
        buf.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&value.to_be_bytes());
    }
}
