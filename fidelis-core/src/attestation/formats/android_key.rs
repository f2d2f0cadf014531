use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{check_leaf_is_credential_key, parse_alg, parse_x5c, signed_data, verify_signature};
use crate::asn1::{
    AndroidKeyDescription, AuthorizationList, KM_ORIGIN_GENERATED, KM_PURPOSE_SIGN,
    OID_ANDROID_KEY_ATTESTATION,
};
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

const FORMAT_ID: &str = "android-key";

/// Android Keystore attestation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidKeyFormat {
    /// Also accept key properties enforced only by the Android OS,
    /// not by the TEE.
    pub allow_software_enforced: bool,
}

impl AndroidKeyFormat {
    pub fn new(allow_software_enforced: bool) -> Self {
        Self {
            allow_software_enforced,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndroidKeyStatement {
    pub algorithm: CoseAlgorithm,
    pub signature: ByteBuffer,
    pub certificates: Vec<X509Certificate>,
}

impl AttestationStatement for AndroidKeyStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for AndroidKeyFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        Ok(Box::new(AndroidKeyStatement {
            algorithm: parse_alg(statement)?,
            signature: statement.require_bytes("sig")?.clone(),
            certificates: parse_x5c(statement)?,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for AndroidKeyFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<AndroidKeyStatement>(statement, FORMAT_ID)?;
        let leaf = &statement.certificates[0];

        let leaf_key = leaf.public_key(statement.algorithm)?;
        verify_signature(
            &leaf_key,
            &signed_data(auth_data, client_data_hash),
            &statement.signature,
            "android-key",
        )?;
        check_leaf_is_credential_key(leaf, auth_data)?;

        let extension = leaf.extension(OID_ANDROID_KEY_ATTESTATION)?.ok_or_else(|| {
            FidelisError::verification("Certificate is missing the Android key attestation extension")
        })?;
        let description = AndroidKeyDescription::parse(&extension.value)?;
        if description.attestation_challenge.as_slice() != client_data_hash {
            return Err(FidelisError::verification(
                "Android attestation challenge does not match the client data hash",
            ));
        }
        self.check_authorization_lists(&description)?;
        debug!(
            software_enforced = self.allow_software_enforced,
            "android-key attestation verified"
        );

        Ok(VerificationResult::new(
            AttestationType::Basic,
            TrustPath::CertificateChain(statement.certificates.clone()),
        ))
    }
}

impl AndroidKeyFormat {
    fn check_authorization_lists(&self, description: &AndroidKeyDescription) -> Result<()> {
        let software = &description.software_enforced;
        let tee = &description.tee_enforced;
        if software.all_applications || tee.all_applications {
            return Err(FidelisError::verification(
                "Android key must not be bound to all applications",
            ));
        }

        let lists: Vec<&AuthorizationList> = if self.allow_software_enforced {
            vec![tee, software]
        } else {
            vec![tee]
        };

        let origin = lists.iter().find_map(|list| list.origin);
        if origin != Some(KM_ORIGIN_GENERATED) {
            return Err(FidelisError::verification(format!(
                "Android key origin must be KM_ORIGIN_GENERATED, found {origin:?}"
            )));
        }

        let signs = lists
            .iter()
            .filter_map(|list| list.purpose.as_ref())
            .any(|purposes| purposes.contains(&KM_PURPOSE_SIGN));
        if !signs {
            return Err(FidelisError::verification(
                "Android key purpose must include KM_PURPOSE_SIGN",
            ));
        }
        Ok(())
    }
}
