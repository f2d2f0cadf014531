use std::fmt;

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use x509_parser::certificate::X509Certificate as ParsedCertificate;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

use crate::buffer::ByteBuffer;
use crate::cose::{spki_curve, verify_ecdsa, CoseAlgorithm, CoseKey, HashAlgorithm, KeyFamily};
use crate::error::{FidelisError, Result};

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

const OID_KP_ANY: &str = "2.5.29.37.0";
const OID_KP_SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";
const OID_KP_CLIENT_AUTH: &str = "1.3.6.1.5.5.7.3.2";
const OID_KP_CODE_SIGNING: &str = "1.3.6.1.5.5.7.3.3";
const OID_KP_EMAIL_PROTECTION: &str = "1.3.6.1.5.5.7.3.4";
const OID_KP_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";
const OID_KP_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";

/// DER-encoded X.509 certificate. Equality is byte identity of the encoding.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct X509Certificate {
    der: ByteBuffer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectName {
    pub country: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub common_name: Option<String>,
    pub attribute_count: usize,
}

impl SubjectName {
    pub fn is_empty(&self) -> bool {
        self.attribute_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateExtension {
    pub critical: bool,
    pub value: ByteBuffer,
}

impl X509Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let cert = Self {
            der: ByteBuffer::new(der),
        };
        let (rest, _) = ParsedCertificate::from_der(cert.der.as_slice())
            .map_err(|e| FidelisError::parse(format!("Invalid X.509 certificate: {e}")))?;
        if !rest.is_empty() {
            return Err(FidelisError::parse("Unexpected data after X.509 certificate"));
        }
        Ok(cert)
    }

    /// Standard base64 DER, as found in metadata statements and JWS `x5c`.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_der(ByteBuffer::from_base64(encoded)?.into_vec())
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let (_, pem) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
            .map_err(|e| FidelisError::parse(format!("Invalid PEM certificate: {e}")))?;
        if pem.label != "CERTIFICATE" {
            return Err(FidelisError::parse(format!(
                "Expected a CERTIFICATE PEM block, found {}",
                pem.label
            )));
        }
        Self::from_der(pem.contents)
    }

    pub fn der(&self) -> &ByteBuffer {
        &self.der
    }

    fn parsed(&self) -> Result<ParsedCertificate<'_>> {
        ParsedCertificate::from_der(self.der.as_slice())
            .map(|(_, cert)| cert)
            .map_err(|e| FidelisError::parse(format!("Invalid X.509 certificate: {e}")))
    }

    /// Certificate version as written in documents (3 for X.509 v3).
    pub fn version(&self) -> Result<u32> {
        Ok(self.parsed()?.version().0 + 1)
    }

    pub fn subject(&self) -> Result<SubjectName> {
        Ok(subject_name(self.parsed()?.subject()))
    }

    pub fn subject_display(&self) -> Result<String> {
        Ok(self.parsed()?.subject().to_string())
    }

    pub fn extension(&self, oid: &str) -> Result<Option<CertificateExtension>> {
        let cert = self.parsed()?;
        Ok(cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| CertificateExtension {
                critical: ext.critical,
                value: ByteBuffer::from(ext.value),
            }))
    }

    /// The basicConstraints CA flag, `None` when the extension is absent.
    pub fn is_ca(&self) -> Result<Option<bool>> {
        let cert = self.parsed()?;
        let constraints = cert
            .basic_constraints()
            .map_err(|e| FidelisError::parse(format!("Invalid basic constraints: {e}")))?;
        Ok(constraints.map(|ext| ext.value.ca))
    }

    pub(crate) fn path_len_constraint(&self) -> Result<Option<u32>> {
        let cert = self.parsed()?;
        let constraints = cert
            .basic_constraints()
            .map_err(|e| FidelisError::parse(format!("Invalid basic constraints: {e}")))?;
        Ok(constraints.and_then(|ext| ext.value.path_len_constraint))
    }

    /// KeyPurposeId OIDs of the extendedKeyUsage extension, in dotted form.
    pub fn extended_key_usages(&self) -> Result<Vec<String>> {
        let cert = self.parsed()?;
        let Some(ext) = cert
            .extended_key_usage()
            .map_err(|e| FidelisError::parse(format!("Invalid extended key usage: {e}")))?
        else {
            return Ok(Vec::new());
        };
        let usage = ext.value;

        let named = [
            (usage.any, OID_KP_ANY),
            (usage.server_auth, OID_KP_SERVER_AUTH),
            (usage.client_auth, OID_KP_CLIENT_AUTH),
            (usage.code_signing, OID_KP_CODE_SIGNING),
            (usage.email_protection, OID_KP_EMAIL_PROTECTION),
            (usage.time_stamping, OID_KP_TIME_STAMPING),
            (usage.ocsp_signing, OID_KP_OCSP_SIGNING),
        ];
        Ok(named
            .into_iter()
            .filter(|(set, _)| *set)
            .map(|(_, oid)| oid.to_string())
            .chain(usage.other.iter().map(|oid| oid.to_id_string()))
            .collect())
    }

    /// DER SubjectPublicKeyInfo.
    pub fn public_key_spki(&self) -> Result<ByteBuffer> {
        Ok(ByteBuffer::from(self.parsed()?.public_key().raw))
    }

    /// Hex SHA-1 of the subjectPublicKey bits, the FIDO attestation key identifier.
    pub fn public_key_identifier(&self) -> Result<String> {
        let cert = self.parsed()?;
        Ok(hex::encode(Sha1::digest(
            cert.public_key().subject_public_key.data.as_ref(),
        )))
    }

    /// The certificate key as a COSE key tagged with `algorithm`.
    pub fn public_key(&self, algorithm: CoseAlgorithm) -> Result<CoseKey> {
        CoseKey::from_spki(self.parsed()?.public_key(), algorithm)
    }

    pub fn validity(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let cert = self.parsed()?;
        let validity = cert.validity();
        let to_utc = |ts: i64| {
            DateTime::<Utc>::from_timestamp(ts, 0)
                .ok_or_else(|| FidelisError::parse("Certificate validity out of range"))
        };
        Ok((
            to_utc(validity.not_before.timestamp())?,
            to_utc(validity.not_after.timestamp())?,
        ))
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> Result<bool> {
        let (not_before, not_after) = self.validity()?;
        Ok(not_before <= at && at <= not_after)
    }

    pub fn is_self_issued(&self) -> Result<bool> {
        let cert = self.parsed()?;
        Ok(cert.issuer().as_raw() == cert.subject().as_raw())
    }

    /// True when `issuer`'s subject names this certificate's issuer and its key
    /// produced this certificate's signature.
    pub fn verify_issued_by(&self, issuer: &X509Certificate) -> Result<bool> {
        let cert = self.parsed()?;
        let issuer_cert = issuer.parsed()?;
        if cert.issuer().as_raw() != issuer_cert.subject().as_raw() {
            return Ok(false);
        }

        let signature_oid = cert.signature_algorithm.algorithm.to_id_string();
        let (family, hash) = signature_algorithm(&signature_oid)?;
        let tbs = cert.tbs_certificate.as_ref();
        let signature = cert.signature_value.data.as_ref();
        let issuer_spki = issuer_cert.public_key();

        match family {
            KeyFamily::Ec2 => {
                if issuer_spki.algorithm.algorithm.to_id_string() != OID_EC_PUBLIC_KEY {
                    return Ok(false);
                }
                let curve = spki_curve(issuer_spki)?;
                let point = issuer_spki.subject_public_key.data.as_ref();
                verify_ecdsa(curve, point, &hash.digest(tbs), signature)
            }
            KeyFamily::Rsa => {
                let algorithm = match hash {
                    HashAlgorithm::Sha1 => CoseAlgorithm::Rs1,
                    HashAlgorithm::Sha256 => CoseAlgorithm::Rs256,
                    HashAlgorithm::Sha384 => CoseAlgorithm::Rs384,
                    HashAlgorithm::Sha512 => CoseAlgorithm::Rs512,
                };
                match CoseKey::from_spki(issuer_spki, algorithm) {
                    Ok(key) => key.verify_signature(tbs, signature),
                    Err(_) => Ok(false),
                }
            }
            KeyFamily::Okp => Err(FidelisError::unsupported("EdDSA certificate signatures")),
        }
    }
}

impl fmt::Debug for X509Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subject_display() {
            Ok(subject) => write!(f, "X509Certificate({subject})"),
            Err(_) => write!(f, "X509Certificate(<{} bytes>)", self.der.len()),
        }
    }
}

fn signature_algorithm(oid: &str) -> Result<(KeyFamily, HashAlgorithm)> {
    Ok(match oid {
        "1.2.840.10045.4.3.2" => (KeyFamily::Ec2, HashAlgorithm::Sha256),
        "1.2.840.10045.4.3.3" => (KeyFamily::Ec2, HashAlgorithm::Sha384),
        "1.2.840.10045.4.3.4" => (KeyFamily::Ec2, HashAlgorithm::Sha512),
        "1.2.840.113549.1.1.5" => (KeyFamily::Rsa, HashAlgorithm::Sha1),
        "1.2.840.113549.1.1.11" => (KeyFamily::Rsa, HashAlgorithm::Sha256),
        "1.2.840.113549.1.1.12" => (KeyFamily::Rsa, HashAlgorithm::Sha384),
        "1.2.840.113549.1.1.13" => (KeyFamily::Rsa, HashAlgorithm::Sha512),
        other => {
            return Err(FidelisError::unsupported(format!(
                "certificate signature algorithm {other}"
            )))
        }
    })
}

fn subject_name(name: &X509Name<'_>) -> SubjectName {
    let first = |values: Vec<Option<String>>| values.into_iter().flatten().next();
    SubjectName {
        country: first(
            name.iter_country()
                .map(|a| a.as_str().ok().map(str::to_string))
                .collect(),
        ),
        organization: first(
            name.iter_organization()
                .map(|a| a.as_str().ok().map(str::to_string))
                .collect(),
        ),
        organizational_unit: first(
            name.iter_organizational_unit()
                .map(|a| a.as_str().ok().map(str::to_string))
                .collect(),
        ),
        common_name: first(
            name.iter_common_name()
                .map(|a| a.as_str().ok().map(str::to_string))
                .collect(),
        ),
        attribute_count: name.iter_attributes().count(),
    }
}
