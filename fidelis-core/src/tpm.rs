//! TPM 2.0 structures carried by the `tpm` attestation format.
//!
//! All integers are big-endian; `TPM2B_*` values are a u16 size followed by
//! that many bytes.

use crate::buffer::ByteBuffer;
use crate::cose::{CoseCurve, CoseKey, HashAlgorithm};
use crate::error::{FidelisError, Result};

/// TPM_GENERATED_VALUE
pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

pub const TPM_ALG_RSA: u16 = 0x0001;
pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000b;
pub const TPM_ALG_SHA384: u16 = 0x000c;
pub const TPM_ALG_SHA512: u16 = 0x000d;
pub const TPM_ALG_NULL: u16 = 0x0010;
pub const TPM_ALG_ECC: u16 = 0x0023;

pub const TPM_ECC_NIST_P256: u16 = 0x0003;
pub const TPM_ECC_NIST_P384: u16 = 0x0004;
pub const TPM_ECC_NIST_P521: u16 = 0x0005;

const RSA_DEFAULT_EXPONENT: u32 = 65537;

/// Sequential big-endian reader over a TPM structure.
struct Cursor<'a> {
    buffer: &'a ByteBuffer,
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(buffer: &'a ByteBuffer) -> Self {
        Self { buffer, offset: 0 }
    }

    fn u8(&mut self) -> Result<u8> {
        let v = self.buffer.get_u8(self.offset)?;
        self.offset += 1;
        Ok(v)
    }

    fn u16(&mut self) -> Result<u16> {
        let v = self.buffer.get_u16(self.offset)?;
        self.offset += 2;
        Ok(v)
    }

    fn u32(&mut self) -> Result<u32> {
        let v = self.buffer.get_u32(self.offset)?;
        self.offset += 4;
        Ok(v)
    }

    fn u64(&mut self) -> Result<u64> {
        let v = self.buffer.get_u64(self.offset)?;
        self.offset += 8;
        Ok(v)
    }

    fn sized(&mut self) -> Result<ByteBuffer> {
        let size = self.u16()? as usize;
        let v = self.buffer.get_bytes(self.offset, size)?;
        self.offset += size;
        Ok(v)
    }

    fn finish(self, structure: &str) -> Result<()> {
        if self.offset != self.buffer.len() {
            return Err(FidelisError::parse(format!(
                "Unexpected bytes at end of {structure} ({} unused)",
                self.buffer.len() - self.offset
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
}

/// TPMS_ATTEST with TPMS_CERTIFY_INFO as the attested data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmAttest {
    pub qualified_signer: ByteBuffer,
    pub extra_data: ByteBuffer,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    pub attested_name: ByteBuffer,
    pub attested_qualified_name: ByteBuffer,
}

impl TpmAttest {
    pub fn parse(data: &ByteBuffer) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let magic = cursor.u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(FidelisError::parse(format!(
                "Invalid TPM attest magic 0x{magic:08x}"
            )));
        }
        let attest_type = cursor.u16()?;
        if attest_type != TPM_ST_ATTEST_CERTIFY {
            return Err(FidelisError::parse(format!(
                "TPM attest type must be TPM_ST_ATTEST_CERTIFY, got 0x{attest_type:04x}"
            )));
        }

        let qualified_signer = cursor.sized()?;
        let extra_data = cursor.sized()?;
        let clock_info = ClockInfo {
            clock: cursor.u64()?,
            reset_count: cursor.u32()?,
            restart_count: cursor.u32()?,
            safe: cursor.u8()? != 0,
        };
        let firmware_version = cursor.u64()?;
        let attested_name = cursor.sized()?;
        let attested_qualified_name = cursor.sized()?;
        cursor.finish("TPMS_ATTEST")?;

        Ok(Self {
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested_name,
            attested_qualified_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmParameters {
    Rsa {
        symmetric: u16,
        scheme: u16,
        key_bits: u16,
        exponent: u32,
    },
    Ecc {
        symmetric: u16,
        scheme: u16,
        curve_id: u16,
        kdf: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmUnique {
    Rsa { modulus: ByteBuffer },
    Ecc { x: ByteBuffer, y: ByteBuffer },
}

/// TPMT_PUBLIC, the public area of the credential key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmPublic {
    raw: ByteBuffer,
    pub key_type: u16,
    pub name_alg: u16,
    pub object_attributes: u32,
    pub auth_policy: ByteBuffer,
    pub parameters: TpmParameters,
    pub unique: TpmUnique,
}

impl TpmPublic {
    pub fn parse(data: &ByteBuffer) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let key_type = cursor.u16()?;
        let name_alg = cursor.u16()?;
        let object_attributes = cursor.u32()?;
        let auth_policy = cursor.sized()?;

        let (parameters, unique) = match key_type {
            TPM_ALG_RSA => {
                let parameters = TpmParameters::Rsa {
                    symmetric: cursor.u16()?,
                    scheme: cursor.u16()?,
                    key_bits: cursor.u16()?,
                    exponent: cursor.u32()?,
                };
                let unique = TpmUnique::Rsa {
                    modulus: cursor.sized()?,
                };
                (parameters, unique)
            }
            TPM_ALG_ECC => {
                let parameters = TpmParameters::Ecc {
                    symmetric: cursor.u16()?,
                    scheme: cursor.u16()?,
                    curve_id: cursor.u16()?,
                    kdf: cursor.u16()?,
                };
                let unique = TpmUnique::Ecc {
                    x: cursor.sized()?,
                    y: cursor.sized()?,
                };
                (parameters, unique)
            }
            other => {
                return Err(FidelisError::unsupported(format!(
                    "TPM public key type 0x{other:04x}"
                )))
            }
        };
        cursor.finish("TPMT_PUBLIC")?;

        Ok(Self {
            raw: data.clone(),
            key_type,
            name_alg,
            object_attributes,
            auth_policy,
            parameters,
            unique,
        })
    }

    pub fn raw(&self) -> &ByteBuffer {
        &self.raw
    }

    /// Checks `name` against nameAlg || H_nameAlg(public area).
    pub fn is_valid_pub_info_name(&self, name: &ByteBuffer) -> Result<bool> {
        let hash = name_hash_algorithm(self.name_alg)?;
        let mut expected = self.name_alg.to_be_bytes().to_vec();
        expected.extend(hash.digest(self.raw.as_slice()));
        Ok(expected == name.as_slice())
    }

    /// True when the unique field and parameters describe `key`.
    pub fn matches_cose_key(&self, key: &CoseKey) -> bool {
        match (&self.parameters, &self.unique, key) {
            (TpmParameters::Rsa { exponent, .. }, TpmUnique::Rsa { modulus }, CoseKey::Rsa(rsa)) => {
                let exponent = if *exponent == 0 {
                    RSA_DEFAULT_EXPONENT
                } else {
                    *exponent
                };
                let cose_exponent = trim(rsa.exponent().as_slice());
                if cose_exponent.len() > 8 {
                    return false;
                }
                let cose_exponent = cose_exponent
                    .iter()
                    .fold(0u64, |acc, b| (acc << 8) | *b as u64);
                trim(modulus.as_slice()) == trim(rsa.modulus().as_slice())
                    && cose_exponent == exponent as u64
            }
            (TpmParameters::Ecc { curve_id, .. }, TpmUnique::Ecc { x, y }, CoseKey::Ec2(ec)) => {
                let curve = match *curve_id {
                    TPM_ECC_NIST_P256 => CoseCurve::P256,
                    TPM_ECC_NIST_P384 => CoseCurve::P384,
                    TPM_ECC_NIST_P521 => CoseCurve::P521,
                    _ => return false,
                };
                curve == ec.curve() && x == ec.x() && y == ec.y()
            }
            _ => false,
        }
    }
}

fn name_hash_algorithm(alg: u16) -> Result<HashAlgorithm> {
    match alg {
        TPM_ALG_SHA1 => Ok(HashAlgorithm::Sha1),
        TPM_ALG_SHA256 => Ok(HashAlgorithm::Sha256),
        TPM_ALG_SHA384 => Ok(HashAlgorithm::Sha384),
        TPM_ALG_SHA512 => Ok(HashAlgorithm::Sha512),
        other => Err(FidelisError::unsupported(format!(
            "Unsupported name hash algorithm 0x{other:04X}"
        ))),
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
