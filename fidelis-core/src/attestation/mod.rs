//! Attestation objects, statement formats and their registry.

pub mod formats;
mod object;
mod registry;

pub use object::AttestationObject;
pub use registry::{
    AttestationFormat, AttestationFormatRegistry, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
