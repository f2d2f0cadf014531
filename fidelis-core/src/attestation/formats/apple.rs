use std::any::Any;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{check_leaf_is_credential_key, parse_x5c, signed_data};
use crate::asn1::{self, OID_APPLE_NONCE};
use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{FidelisError, Result};
use crate::pki::{TrustPath, X509Certificate};

const FORMAT_ID: &str = "apple";

/// Apple anonymous attestation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppleFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct AppleStatement {
    pub certificates: Vec<X509Certificate>,
}

impl AttestationStatement for AppleStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for AppleFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        Ok(Box::new(AppleStatement {
            certificates: parse_x5c(statement)?,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for AppleFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<AppleStatement>(statement, FORMAT_ID)?;
        let leaf = &statement.certificates[0];

        let extension = leaf.extension(OID_APPLE_NONCE)?.ok_or_else(|| {
            FidelisError::verification("Certificate is missing the Apple nonce extension")
        })?;
        let nonce = asn1::parse_apple_nonce(&extension.value)?;
        let expected = Sha256::digest(signed_data(auth_data, client_data_hash));
        if nonce.as_slice() != &expected[..] {
            return Err(FidelisError::verification("Apple attestation nonce does not match"));
        }
        check_leaf_is_credential_key(leaf, auth_data)?;
        debug!("apple attestation verified");

        Ok(VerificationResult::new(
            AttestationType::AnonCa,
            TrustPath::CertificateChain(statement.certificates.clone()),
        ))
    }
}
