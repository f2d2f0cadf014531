use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{FidelisError, Result};

/// COSE algorithm identifiers (IANA "COSE Algorithms" registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    Es256,
    EdDsa,
    Es384,
    Es512,
    Ps256,
    Rs256,
    Rs384,
    Rs512,
    Rs1,
}

/// The key family an algorithm signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Ec2,
    Okp,
    Rsa,
}

impl CoseAlgorithm {
    pub fn from_id(id: i64) -> Result<Self> {
        Ok(match id {
            -7 => Self::Es256,
            -8 => Self::EdDsa,
            -35 => Self::Es384,
            -36 => Self::Es512,
            -37 => Self::Ps256,
            -257 => Self::Rs256,
            -258 => Self::Rs384,
            -259 => Self::Rs512,
            -65535 => Self::Rs1,
            other => {
                return Err(FidelisError::unsupported(format!(
                    "COSE algorithm {other}"
                )))
            }
        })
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::Ps256 => -37,
            Self::Rs256 => -257,
            Self::Rs384 => -258,
            Self::Rs512 => -259,
            Self::Rs1 => -65535,
        }
    }

    pub fn key_family(self) -> KeyFamily {
        match self {
            Self::Es256 | Self::Es384 | Self::Es512 => KeyFamily::Ec2,
            Self::EdDsa => KeyFamily::Okp,
            Self::Ps256 | Self::Rs256 | Self::Rs384 | Self::Rs512 | Self::Rs1 => KeyFamily::Rsa,
        }
    }

    /// Digest used when signing. EdDSA signs the message itself.
    pub fn hash(self) -> Result<HashAlgorithm> {
        match self {
            Self::Es256 | Self::Ps256 | Self::Rs256 => Ok(HashAlgorithm::Sha256),
            Self::Es384 | Self::Rs384 => Ok(HashAlgorithm::Sha384),
            Self::Es512 | Self::Rs512 => Ok(HashAlgorithm::Sha512),
            Self::Rs1 => Ok(HashAlgorithm::Sha1),
            Self::EdDsa => Err(FidelisError::unsupported("EdDSA has no separate digest")),
        }
    }

    /// The curve an ECDSA algorithm is bound to.
    pub fn curve(self) -> Option<CoseCurve> {
        match self {
            Self::Es256 => Some(CoseCurve::P256),
            Self::Es384 => Some(CoseCurve::P384),
            Self::Es512 => Some(CoseCurve::P521),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Es256 => "ES256",
            Self::EdDsa => "EdDSA",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::Ps256 => "PS256",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Rs1 => "RS1",
        }
    }
}

/// COSE elliptic curve identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseCurve {
    P256,
    P384,
    P521,
}

impl CoseCurve {
    pub fn from_id(id: i64) -> Result<Self> {
        match id {
            1 => Ok(Self::P256),
            2 => Ok(Self::P384),
            3 => Ok(Self::P521),
            other => Err(FidelisError::unsupported(format!("COSE curve {other}"))),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
        }
    }

    /// Length of one affine coordinate in bytes.
    pub fn coordinate_length(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}
