//! Authenticator Attestation GUID.

use std::fmt;

use uuid::Uuid;

use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

pub const AAGUID_LENGTH: usize = 16;

/// 16-byte authenticator model identifier. Equality is byte equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Aaguid([u8; AAGUID_LENGTH]);

impl Aaguid {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; AAGUID_LENGTH] = bytes.try_into().map_err(|_| {
            FidelisError::parse(format!(
                "AAGUID must be {AAGUID_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parses the hyphenated form, e.g. `00112233-4455-6677-8899-aabbccddeeff`.
    pub fn parse_string(value: &str) -> Result<Self> {
        Uuid::parse_str(value)
            .map(|uuid| Self(*uuid.as_bytes()))
            .map_err(|e| FidelisError::parse(format!("Invalid AAGUID '{value}': {e}")))
    }

    pub fn zero() -> Self {
        Self([0u8; AAGUID_LENGTH])
    }

    /// U2F authenticators and privacy-preserving attestations report all zeroes.
    pub fn is_zero_aaguid(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; AAGUID_LENGTH] {
        &self.0
    }

    pub fn to_buffer(&self) -> ByteBuffer {
        ByteBuffer::from(&self.0[..])
    }
}

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

impl fmt::Debug for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aaguid({self})")
    }
}
