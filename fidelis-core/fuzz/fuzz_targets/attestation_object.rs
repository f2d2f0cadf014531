#![no_main]

//! Fuzz target for AttestationObject::parse() and statement verification
//!
//! Run with: cargo +nightly fuzz run attestation_object

use fidelis_core::{verify_registration, AttestationFormatRegistry, AttestationObject, ByteBuffer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(object) = AttestationObject::parse(&ByteBuffer::new(data.to_vec())) else {
        return;
    };
    // Every registered format must reject garbage with an error, not a panic
    let registry = AttestationFormatRegistry::with_default_formats();
    let _ = verify_registration(&registry, &object, &[0u8; 32]);
});
