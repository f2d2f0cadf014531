use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{check_aaguid_extension, parse_alg, parse_x5c, signed_data, verify_signature};
use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::CoseAlgorithm;
use crate::error::{FidelisError, Result};
use crate::pki::{TrustPath, X509Certificate};

const FORMAT_ID: &str = "packed";
const ATTESTATION_OU: &str = "Authenticator Attestation";

/// WebAuthn packed attestation: full (x5c) or self attestation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct PackedStatement {
    pub algorithm: CoseAlgorithm,
    pub signature: ByteBuffer,
    pub certificates: Option<Vec<X509Certificate>>,
    pub ecdaa_key_id: Option<ByteBuffer>,
}

impl AttestationStatement for PackedStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for PackedFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        let certificates = if statement.contains_text_key("x5c") {
            Some(parse_x5c(statement)?)
        } else {
            None
        };
        let ecdaa_key_id = if statement.contains_text_key("ecdaaKeyId") {
            Some(statement.require_bytes("ecdaaKeyId")?.clone())
        } else {
            None
        };
        Ok(Box::new(PackedStatement {
            algorithm: parse_alg(statement)?,
            signature: statement.require_bytes("sig")?.clone(),
            certificates,
            ecdaa_key_id,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for PackedFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<PackedStatement>(statement, FORMAT_ID)?;
        let message = signed_data(auth_data, client_data_hash);

        if statement.ecdaa_key_id.is_some() {
            return Err(FidelisError::unsupported("ECDAA attestation"));
        }

        match &statement.certificates {
            Some(certificates) => {
                let leaf = &certificates[0];
                let key = leaf.public_key(statement.algorithm)?;
                verify_signature(&key, &message, &statement.signature, "packed")?;
                check_attestation_certificate(leaf)?;
                check_aaguid_extension(leaf, auth_data)?;
                debug!("packed full attestation verified");
                Ok(VerificationResult::new(
                    AttestationType::Basic,
                    TrustPath::CertificateChain(certificates.clone()),
                ))
            }
            None => {
                let credential_key = auth_data.credential_public_key()?;
                if credential_key.algorithm() != statement.algorithm {
                    return Err(FidelisError::verification(format!(
                        "Self attestation algorithm {} does not match credential key algorithm {}",
                        statement.algorithm.name(),
                        credential_key.algorithm().name()
                    )));
                }
                verify_signature(credential_key, &message, &statement.signature, "packed self")?;
                debug!("packed self attestation verified");
                Ok(VerificationResult::new(
                    AttestationType::SelfAttestation,
                    TrustPath::Empty,
                ))
            }
        }
    }
}

/// Packed attestation certificate requirements (WebAuthn 8.2.1).
fn check_attestation_certificate(certificate: &X509Certificate) -> Result<()> {
    let version = certificate.version()?;
    if version != 3 {
        return Err(FidelisError::verification(format!(
            "Attestation certificate must be version 3, found {version}"
        )));
    }

    let subject = certificate.subject()?;
    let missing = [
        ("C", &subject.country),
        ("O", &subject.organization),
        ("OU", &subject.organizational_unit),
        ("CN", &subject.common_name),
    ]
    .into_iter()
    .find(|(_, value)| value.as_deref().map_or(true, str::is_empty));
    if let Some((field, _)) = missing {
        return Err(FidelisError::verification(format!(
            "Attestation certificate subject is missing {field}"
        )));
    }
    if subject.organizational_unit.as_deref() != Some(ATTESTATION_OU) {
        return Err(FidelisError::verification(format!(
            "Attestation certificate OU must be '{ATTESTATION_OU}'"
        )));
    }

    if certificate.is_ca()? == Some(true) {
        return Err(FidelisError::verification(
            "Attestation certificate must not be a CA",
        ));
    }
    Ok(())
}
