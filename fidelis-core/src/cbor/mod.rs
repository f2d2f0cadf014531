//! CBOR codec for attestation objects, authenticator extensions and COSE keys.

mod decoder;
mod encoder;
mod value;

pub use decoder::{decode, decode_in_place};
pub use encoder::encode;
pub use value::{CborMap, CborValue};

// CBOR major types
const MT_UNSIGNED: u8 = 0;
const MT_NEGATIVE: u8 = 1;
const MT_BYTE_STRING: u8 = 2;
const MT_TEXT_STRING: u8 = 3;
const MT_ARRAY: u8 = 4;
const MT_MAP: u8 = 5;
const MT_TAG: u8 = 6;
const MT_SIMPLE: u8 = 7;
