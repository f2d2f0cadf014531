//! COSE key model and signature verification.

mod algorithm;
mod key;

pub use algorithm::{CoseAlgorithm, CoseCurve, HashAlgorithm, KeyFamily};
pub use key::{CoseKey, Ec2Key, RsaKey};

pub(crate) use key::{spki_curve, verify_ecdsa};
