//! Strict CBOR decoder.
//!
//! Rejects indefinite lengths, reserved additional-information values, tags,
//! simple values other than false/true/null, duplicate map keys and map keys
//! that are neither integers nor text strings.

use std::collections::HashSet;

use super::value::{CborMap, CborValue};
use super::{
    MT_ARRAY, MT_BYTE_STRING, MT_MAP, MT_NEGATIVE, MT_SIMPLE, MT_TAG, MT_TEXT_STRING, MT_UNSIGNED,
};
use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

const MAX_NESTING_DEPTH: usize = 64;

/// Decode a buffer that must contain exactly one CBOR item.
pub fn decode(buffer: &ByteBuffer) -> Result<CborValue> {
    let (value, end) = decode_in_place(buffer, 0)?;
    if end != buffer.len() {
        return Err(FidelisError::cbor(format!(
            "{} unused trailing bytes after CBOR item",
            buffer.len() - end
        )));
    }
    Ok(value)
}

/// Decode one CBOR item starting at `offset`, returning it together with the
/// offset just past its last byte. Trailing data is left for the caller.
pub fn decode_in_place(buffer: &ByteBuffer, offset: usize) -> Result<(CborValue, usize)> {
    let mut decoder = Decoder {
        buffer,
        offset,
        depth: 0,
    };
    let value = decoder.read_item()?;
    Ok((value, decoder.offset))
}

/// Hashable form of the key types a map may carry.
#[derive(PartialEq, Eq, Hash)]
enum SeenKey {
    Unsigned(u64),
    Negative(i64),
    Text(String),
}

struct Decoder<'a> {
    buffer: &'a ByteBuffer,
    offset: usize,
    depth: usize,
}

impl Decoder<'_> {
    fn read_item(&mut self) -> Result<CborValue> {
        let initial = self.next_u8()?;
        let major_type = initial >> 5;
        let info = initial & 0x1f;

        match info {
            28..=30 => {
                return Err(FidelisError::cbor(format!(
                    "reserved additional information value {info} (initial byte 0x{initial:02x})"
                )))
            }
            31 if initial == 0xff => {
                return Err(FidelisError::cbor(
                    "unexpected break byte outside an indefinite-length item",
                ))
            }
            31 => {
                return Err(FidelisError::cbor(format!(
                    "indefinite-length items are not supported (major type {major_type})"
                )))
            }
            _ => {}
        }

        if major_type == MT_SIMPLE {
            return self.read_simple(info);
        }

        let argument = self.read_argument(info)?;
        match major_type {
            MT_UNSIGNED => {
                if argument > i64::MAX as u64 {
                    return Err(FidelisError::cbor(format!(
                        "unsigned integer {argument} is out of range"
                    )));
                }
                Ok(CborValue::UnsignedInt(argument))
            }
            MT_NEGATIVE => {
                let magnitude = i64::try_from(argument).map_err(|_| {
                    FidelisError::cbor(format!("negative integer -1-{argument} is out of range"))
                })?;
                Ok(CborValue::NegativeInt(-1 - magnitude))
            }
            MT_BYTE_STRING => {
                let length = self.length(argument)?;
                let bytes = self.buffer.get_bytes(self.offset, length).map_err(|_| {
                    FidelisError::cbor(format!("insufficient bytes for byte string of {length}"))
                })?;
                self.offset += length;
                Ok(CborValue::ByteString(bytes))
            }
            MT_TEXT_STRING => {
                let length = self.length(argument)?;
                let bytes = self.buffer.slice(self.offset, length).map_err(|_| {
                    FidelisError::cbor(format!("insufficient bytes for text string of {length}"))
                })?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| FidelisError::cbor(format!("invalid UTF-8 in text string: {e}")))?
                    .to_string();
                self.offset += length;
                Ok(CborValue::TextString(text))
            }
            MT_ARRAY => {
                let count = self.length(argument)?;
                self.enter()?;
                // Every item needs at least one byte.
                let mut items = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    items.push(self.read_item()?);
                }
                self.depth -= 1;
                Ok(CborValue::Array(items))
            }
            MT_MAP => {
                let count = self.length(argument)?;
                self.enter()?;
                let mut map = CborMap::new();
                let mut seen = HashSet::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    let key = self.read_item()?;
                    let seen_key = match &key {
                        CborValue::UnsignedInt(n) => SeenKey::Unsigned(*n),
                        CborValue::NegativeInt(n) => SeenKey::Negative(*n),
                        CborValue::TextString(text) => SeenKey::Text(text.clone()),
                        other => {
                            return Err(FidelisError::cbor(format!(
                                "map key must be an integer or text string, found {}",
                                other.type_name()
                            )))
                        }
                    };
                    if !seen.insert(seen_key) {
                        return Err(FidelisError::cbor(format!("duplicate key {key:?} in map")));
                    }
                    let value = self.read_item()?;
                    map.push_unique(key, value);
                }
                self.depth -= 1;
                Ok(CborValue::Map(map))
            }
            MT_TAG => Err(FidelisError::cbor(format!("tag {argument} is not supported"))),
            _ => Err(FidelisError::cbor(format!("invalid major type {major_type}"))),
        }
    }

    fn read_simple(&mut self, info: u8) -> Result<CborValue> {
        match info {
            20 => Ok(CborValue::Bool(false)),
            21 => Ok(CborValue::Bool(true)),
            22 => Ok(CborValue::Null),
            25 => {
                let bits = self.take::<2>()?;
                Ok(CborValue::Float(half_to_f64(u16::from_be_bytes(bits))))
            }
            26 => Ok(CborValue::Float(f32::from_be_bytes(self.take::<4>()?) as f64)),
            27 => Ok(CborValue::Float(f64::from_be_bytes(self.take::<8>()?))),
            _ => Err(FidelisError::cbor(format!(
                "simple value {info} is not supported"
            ))),
        }
    }

    fn read_argument(&mut self, info: u8) -> Result<u64> {
        Ok(match info {
            0..=23 => info as u64,
            24 => self.next_u8()? as u64,
            25 => u16::from_be_bytes(self.take::<2>()?) as u64,
            26 => u32::from_be_bytes(self.take::<4>()?) as u64,
            27 => u64::from_be_bytes(self.take::<8>()?),
            _ => return Err(FidelisError::cbor(format!("invalid additional information {info}"))),
        })
    }

    fn length(&self, argument: u64) -> Result<usize> {
        usize::try_from(argument)
            .ok()
            .filter(|len| *len <= self.remaining())
            .ok_or_else(|| {
                FidelisError::cbor(format!(
                    "declared length {argument} exceeds the {} remaining bytes",
                    self.remaining()
                ))
            })
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(FidelisError::cbor(format!(
                "nesting deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    fn next_u8(&mut self) -> Result<u8> {
        let byte = self
            .buffer
            .get_u8(self.offset)
            .map_err(|_| FidelisError::cbor("unexpected end of input"))?;
        self.offset += 1;
        Ok(byte)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self
            .buffer
            .slice(self.offset, N)
            .map_err(|_| FidelisError::cbor("unexpected end of input"))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.offset += N;
        Ok(out)
    }
}

/// IEEE 754 half precision to double.
fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 10) & 0x1f) as i32;
    let fraction = (bits & 0x03ff) as f64;
    match exponent {
        0 => sign * fraction * 2f64.powi(-24),
        31 if fraction == 0.0 => sign * f64::INFINITY,
        31 => f64::NAN,
        _ => sign * (1.0 + fraction / 1024.0) * 2f64.powi(exponent - 15),
    }
}
