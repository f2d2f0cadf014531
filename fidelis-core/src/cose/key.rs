use rsa::{BigUint, Pkcs1v15Sign, Pss, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use tracing::debug;
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::algorithm::{CoseAlgorithm, CoseCurve, HashAlgorithm, KeyFamily};
use crate::buffer::ByteBuffer;
use crate::cbor::{self, CborMap, CborValue};
use crate::error::{FidelisError, Result};

// COSE key labels (RFC 8152 section 7 and 13)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_EC2_CRV: i64 = -1;
const LABEL_EC2_X: i64 = -2;
const LABEL_EC2_Y: i64 = -3;
const LABEL_RSA_N: i64 = -1;
const LABEL_RSA_E: i64 = -2;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";
const OID_CURVE_P521: &str = "1.3.132.0.35";

/// A credential or attestation public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    Ec2(Ec2Key),
    Rsa(RsaKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Key {
    algorithm: CoseAlgorithm,
    curve: CoseCurve,
    x: ByteBuffer,
    y: ByteBuffer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    algorithm: CoseAlgorithm,
    modulus: ByteBuffer,
    exponent: ByteBuffer,
}

impl Ec2Key {
    pub fn curve(&self) -> CoseCurve {
        self.curve
    }

    pub fn x(&self) -> &ByteBuffer {
        &self.x
    }

    pub fn y(&self) -> &ByteBuffer {
        &self.y
    }
}

impl RsaKey {
    pub fn modulus(&self) -> &ByteBuffer {
        &self.modulus
    }

    pub fn exponent(&self) -> &ByteBuffer {
        &self.exponent
    }
}

impl CoseKey {
    pub fn ec2(
        algorithm: CoseAlgorithm,
        curve: CoseCurve,
        x: ByteBuffer,
        y: ByteBuffer,
    ) -> Result<Self> {
        if algorithm.key_family() != KeyFamily::Ec2 {
            return Err(FidelisError::parse(format!(
                "Algorithm {} cannot be used with an EC2 key",
                algorithm.name()
            )));
        }
        if algorithm.curve() != Some(curve) {
            return Err(FidelisError::parse(format!(
                "Algorithm {} does not match curve {curve:?}",
                algorithm.name()
            )));
        }
        let expected = curve.coordinate_length();
        if x.len() != expected || y.len() != expected {
            return Err(FidelisError::parse(format!(
                "EC2 coordinates for {curve:?} must be {expected} bytes, got {} and {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Self::Ec2(Ec2Key {
            algorithm,
            curve,
            x,
            y,
        }))
    }

    pub fn rsa(algorithm: CoseAlgorithm, modulus: ByteBuffer, exponent: ByteBuffer) -> Result<Self> {
        if algorithm.key_family() != KeyFamily::Rsa {
            return Err(FidelisError::parse(format!(
                "Algorithm {} cannot be used with an RSA key",
                algorithm.name()
            )));
        }
        if modulus.is_empty() || exponent.is_empty() {
            return Err(FidelisError::parse("RSA modulus and exponent must not be empty"));
        }
        Ok(Self::Rsa(RsaKey {
            algorithm,
            modulus,
            exponent,
        }))
    }

    /// Parse a COSE key map embedded in a larger buffer, returning the key
    /// and the offset just past it.
    pub fn parse_in_place(buffer: &ByteBuffer, offset: usize) -> Result<(Self, usize)> {
        let (value, end) = cbor::decode_in_place(buffer, offset)?;
        Ok((Self::from_cbor(&value)?, end))
    }

    pub fn from_cbor(value: &CborValue) -> Result<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| FidelisError::parse("COSE key must be a CBOR map"))?;

        let kty = int_label(map, LABEL_KTY, "kty")?;
        let algorithm = CoseAlgorithm::from_id(int_label(map, LABEL_ALG, "alg")?)?;

        match kty {
            KTY_EC2 => {
                let curve = CoseCurve::from_id(int_label(map, LABEL_EC2_CRV, "crv")?)?;
                let x = bytes_label(map, LABEL_EC2_X, "x")?;
                let y = match map.get_int_key(LABEL_EC2_Y) {
                    Some(CborValue::Bool(_)) => {
                        return Err(FidelisError::unsupported("compressed EC2 points"))
                    }
                    _ => bytes_label(map, LABEL_EC2_Y, "y")?,
                };
                Self::ec2(algorithm, curve, x, y)
            }
            KTY_RSA => {
                let modulus = bytes_label(map, LABEL_RSA_N, "n")?;
                let exponent = bytes_label(map, LABEL_RSA_E, "e")?;
                Self::rsa(algorithm, modulus, exponent)
            }
            KTY_OKP => Err(FidelisError::unsupported("OKP (EdDSA) keys")),
            other => Err(FidelisError::unsupported(format!("COSE key type {other}"))),
        }
    }

    pub fn to_cbor(&self) -> Result<CborValue> {
        let map = match self {
            CoseKey::Ec2(key) => CborMap::new()
                .with(CborValue::from_int(LABEL_KTY), CborValue::from_int(KTY_EC2))?
                .with(CborValue::from_int(LABEL_ALG), CborValue::from_int(key.algorithm.id()))?
                .with(CborValue::from_int(LABEL_EC2_CRV), CborValue::from_int(key.curve.id()))?
                .with(CborValue::from_int(LABEL_EC2_X), CborValue::ByteString(key.x.clone()))?
                .with(CborValue::from_int(LABEL_EC2_Y), CborValue::ByteString(key.y.clone()))?,
            CoseKey::Rsa(key) => CborMap::new()
                .with(CborValue::from_int(LABEL_KTY), CborValue::from_int(KTY_RSA))?
                .with(CborValue::from_int(LABEL_ALG), CborValue::from_int(key.algorithm.id()))?
                .with(CborValue::from_int(LABEL_RSA_N), CborValue::ByteString(key.modulus.clone()))?
                .with(
                    CborValue::from_int(LABEL_RSA_E),
                    CborValue::ByteString(key.exponent.clone()),
                )?,
        };
        Ok(CborValue::Map(map))
    }

    /// Canonical CBOR encoding of the key.
    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::encode(&self.to_cbor()?)
    }

    /// Build a key from a DER SubjectPublicKeyInfo, checking that its type and
    /// curve fit `algorithm`.
    pub fn from_spki_der(spki_der: &[u8], algorithm: CoseAlgorithm) -> Result<Self> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(spki_der)
            .map_err(|e| FidelisError::parse(format!("Invalid SubjectPublicKeyInfo: {e}")))?;
        Self::from_spki(&spki, algorithm)
    }

    pub(crate) fn from_spki(spki: &SubjectPublicKeyInfo<'_>, algorithm: CoseAlgorithm) -> Result<Self> {
        let key_oid = spki.algorithm.algorithm.to_id_string();
        match (algorithm.key_family(), key_oid.as_str()) {
            (KeyFamily::Ec2, OID_EC_PUBLIC_KEY) => {
                let curve = spki_curve(spki)?;
                if algorithm.curve() != Some(curve) {
                    return Err(FidelisError::unsupported(format!(
                        "{:?} key cannot be used with {}",
                        curve,
                        algorithm.name()
                    )));
                }
                let point = spki.subject_public_key.data.as_ref();
                let len = curve.coordinate_length();
                if point.len() != 1 + 2 * len || point[0] != 0x04 {
                    return Err(FidelisError::parse("EC public key is not an uncompressed point"));
                }
                Self::ec2(
                    algorithm,
                    curve,
                    ByteBuffer::from(&point[1..1 + len]),
                    ByteBuffer::from(&point[1 + len..]),
                )
            }
            (KeyFamily::Rsa, OID_RSA_ENCRYPTION) => match spki.parsed() {
                Ok(PublicKey::RSA(rsa)) => Self::rsa(
                    algorithm,
                    ByteBuffer::from(strip_leading_zeros(rsa.modulus)),
                    ByteBuffer::from(strip_leading_zeros(rsa.exponent)),
                ),
                _ => Err(FidelisError::parse("Invalid RSA public key")),
            },
            (_, oid) => Err(FidelisError::unsupported(format!(
                "Public key type {oid} cannot be used with {}",
                algorithm.name()
            ))),
        }
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        match self {
            CoseKey::Ec2(key) => key.algorithm,
            CoseKey::Rsa(key) => key.algorithm,
        }
    }

    /// ANSI X9.62 uncompressed point (0x04 || x || y).
    pub fn uncompressed_point(&self) -> Result<Vec<u8>> {
        match self {
            CoseKey::Ec2(key) => {
                let mut point = Vec::with_capacity(1 + key.x.len() + key.y.len());
                point.push(0x04);
                point.extend_from_slice(key.x.as_slice());
                point.extend_from_slice(key.y.as_slice());
                Ok(point)
            }
            CoseKey::Rsa(_) => Err(FidelisError::unsupported("RSA keys have no EC point")),
        }
    }

    /// True when both keys carry the same public key material, whatever
    /// algorithm they are tagged with.
    pub fn same_public_key(&self, other: &CoseKey) -> bool {
        match (self, other) {
            (CoseKey::Ec2(a), CoseKey::Ec2(b)) => a.curve == b.curve && a.x == b.x && a.y == b.y,
            (CoseKey::Rsa(a), CoseKey::Rsa(b)) => {
                strip_leading_zeros(a.modulus.as_slice()) == strip_leading_zeros(b.modulus.as_slice())
                    && strip_leading_zeros(a.exponent.as_slice())
                        == strip_leading_zeros(b.exponent.as_slice())
            }
            _ => false,
        }
    }

    /// Verify a signature over `message` with this key's algorithm. ECDSA
    /// signatures are DER encoded. A well-formed but wrong signature yields
    /// `Ok(false)`; unsupported algorithms and curves are errors.
    pub fn verify_signature(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        let algorithm = self.algorithm();
        match self {
            CoseKey::Ec2(key) => {
                let digest = algorithm.hash()?.digest(message);
                let point = self.uncompressed_point()?;
                verify_ecdsa(key.curve, &point, &digest, signature)
            }
            CoseKey::Rsa(key) => {
                let public_key = RsaPublicKey::new(
                    BigUint::from_bytes_be(key.modulus.as_slice()),
                    BigUint::from_bytes_be(key.exponent.as_slice()),
                )
                .map_err(|e| FidelisError::parse(format!("Invalid RSA public key: {e}")))?;
                let hash = algorithm.hash()?;
                let digest = hash.digest(message);
                let outcome = match (algorithm, hash) {
                    (CoseAlgorithm::Ps256, _) => {
                        public_key.verify(Pss::new::<Sha256>(), &digest, signature)
                    }
                    (_, HashAlgorithm::Sha1) => {
                        public_key.verify(Pkcs1v15Sign::new::<Sha1>(), &digest, signature)
                    }
                    (_, HashAlgorithm::Sha256) => {
                        public_key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    }
                    (_, HashAlgorithm::Sha384) => {
                        public_key.verify(Pkcs1v15Sign::new::<Sha384>(), &digest, signature)
                    }
                    (_, HashAlgorithm::Sha512) => {
                        public_key.verify(Pkcs1v15Sign::new::<Sha512>(), &digest, signature)
                    }
                };
                if let Err(e) = &outcome {
                    debug!(error = %e, alg = algorithm.name(), "RSA signature rejected");
                }
                Ok(outcome.is_ok())
            }
        }
    }
}

/// ECDSA over a precomputed digest. The digest may come from a hash that does
/// not match the curve size (e.g. certificates signed with SHA-384 by a P-256 key).
pub(crate) fn verify_ecdsa(
    curve: CoseCurve,
    sec1_point: &[u8],
    digest: &[u8],
    der_signature: &[u8],
) -> Result<bool> {
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    let valid = match curve {
        CoseCurve::P256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(sec1_point)
                .map_err(|e| FidelisError::parse(format!("Invalid P-256 public key: {e}")))?;
            match p256::ecdsa::Signature::from_der(der_signature) {
                Ok(sig) => key.verify_prehash(digest, &sig).is_ok(),
                Err(_) => false,
            }
        }
        CoseCurve::P384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(sec1_point)
                .map_err(|e| FidelisError::parse(format!("Invalid P-384 public key: {e}")))?;
            match p384::ecdsa::Signature::from_der(der_signature) {
                Ok(sig) => key.verify_prehash(digest, &sig).is_ok(),
                Err(_) => false,
            }
        }
        CoseCurve::P521 => {
            return Err(FidelisError::unsupported(
                "signature verification on curve P-521",
            ))
        }
    };
    if !valid {
        debug!(curve = ?curve, "ECDSA signature rejected");
    }
    Ok(valid)
}

/// Named curve of an EC SubjectPublicKeyInfo.
pub(crate) fn spki_curve(spki: &SubjectPublicKeyInfo<'_>) -> Result<CoseCurve> {
    let curve = spki
        .algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.as_oid().ok())
        .map(|oid| oid.to_id_string());
    match curve.as_deref() {
        Some(OID_CURVE_P256) => Ok(CoseCurve::P256),
        Some(OID_CURVE_P384) => Ok(CoseCurve::P384),
        Some(OID_CURVE_P521) => Ok(CoseCurve::P521),
        other => Err(FidelisError::unsupported(format!(
            "EC public key curve {}",
            other.unwrap_or("<missing>")
        ))),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn int_label(map: &CborMap, label: i64, name: &str) -> Result<i64> {
    map.get_int_key(label)
        .ok_or_else(|| FidelisError::parse(format!("COSE key is missing '{name}' ({label})")))?
        .as_int()
        .ok_or_else(|| FidelisError::parse(format!("COSE key '{name}' must be an integer")))
}

fn bytes_label(map: &CborMap, label: i64, name: &str) -> Result<ByteBuffer> {
    map.get_int_key(label)
        .ok_or_else(|| FidelisError::parse(format!("COSE key is missing '{name}' ({label})")))?
        .as_bytes()
        .cloned()
        .ok_or_else(|| FidelisError::parse(format!("COSE key '{name}' must be a byte string")))
}
