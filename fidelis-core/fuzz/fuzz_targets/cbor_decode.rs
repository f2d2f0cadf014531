#![no_main]

//! Fuzz target for the CBOR decoder.
//!
//! Decoding must never panic. Anything that decodes re-encodes, except floats
//! which the encoder refuses, and the re-encoding is stable.
//!
//! Run with: cargo +nightly fuzz run cbor_decode

use fidelis_core::cbor;
use fidelis_core::{ByteBuffer, ErrorKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = cbor::decode(&ByteBuffer::new(data.to_vec())) else {
        return;
    };
    let encoded = match cbor::encode(&value) {
        Ok(encoded) => encoded,
        Err(err) if err.kind() == ErrorKind::Unsupported => return,
        Err(err) => panic!("decoded value failed to re-encode: {err}"),
    };
    let again = cbor::decode(&ByteBuffer::new(encoded.clone())).expect("encoder output decodes");
    assert_eq!(cbor::encode(&again).expect("re-encode"), encoded);
});
