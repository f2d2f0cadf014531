use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{parse_x5c, verify_signature};
use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::{CoseAlgorithm, CoseCurve, CoseKey};
use crate::error::{FidelisError, Result};
use crate::pki::{TrustPath, X509Certificate};

const FORMAT_ID: &str = "fido-u2f";

/// FIDO U2F attestation: one P-256 certificate and a signature over the
/// U2F registration message.
#[derive(Debug, Clone, Copy, Default)]
pub struct FidoU2fFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct FidoU2fStatement {
    pub signature: ByteBuffer,
    pub certificates: Vec<X509Certificate>,
}

impl AttestationStatement for FidoU2fStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for FidoU2fFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        Ok(Box::new(FidoU2fStatement {
            signature: statement.require_bytes("sig")?.clone(),
            certificates: parse_x5c(statement)?,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for FidoU2fFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<FidoU2fStatement>(statement, FORMAT_ID)?;
        if statement.certificates.len() != 1 {
            return Err(FidelisError::verification(format!(
                "fido-u2f requires exactly one certificate, found {}",
                statement.certificates.len()
            )));
        }
        let certificate = &statement.certificates[0];
        let attestation_key = certificate
            .public_key(CoseAlgorithm::Es256)
            .map_err(|e| FidelisError::verification(format!("fido-u2f certificate key: {e}")))?;

        let credential = auth_data.attested_credential()?;
        let CoseKey::Ec2(credential_key) = &credential.public_key else {
            return Err(FidelisError::verification("fido-u2f credential key must be EC2"));
        };
        if credential_key.curve() != CoseCurve::P256 {
            return Err(FidelisError::verification("fido-u2f credential key must use P-256"));
        }

        let mut message = Vec::with_capacity(1 + 32 + client_data_hash.len() + 65 + credential.credential_id.len());
        message.push(0x00);
        message.extend_from_slice(auth_data.rp_id_hash().as_slice());
        message.extend_from_slice(client_data_hash);
        message.extend_from_slice(credential.credential_id.as_slice());
        message.extend(credential.public_key.uncompressed_point()?);

        verify_signature(&attestation_key, &message, &statement.signature, "fido-u2f")?;
        debug!("fido-u2f attestation verified");

        Ok(VerificationResult::new(
            AttestationType::Basic,
            TrustPath::CertificateChain(statement.certificates.clone()),
        ))
    }
}
