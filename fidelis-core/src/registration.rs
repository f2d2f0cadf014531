//! Registration (credential creation) verification.

use std::fmt;

use tracing::{debug, instrument};

use crate::aaguid::Aaguid;
use crate::attestation::{AttestationFormatRegistry, AttestationObject, AttestationType};
use crate::buffer::ByteBuffer;
use crate::cose::CoseKey;
use crate::error::{FidelisError, Result};
use crate::pki::TrustPath;

/// A verified registration, ready for a trust decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    pub credential_id: ByteBuffer,
    pub public_key: CoseKey,
    pub format: String,
    pub attestation_type: AttestationType,
    pub trust_path: TrustPath,
    pub sign_count: u32,
    pub aaguid: Aaguid,
    pub user_verified: bool,
}

/// Key under which metadata describes an authenticator model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataIdentifier {
    Aaguid(Aaguid),
    /// UAF authenticator id, `vendor#model`.
    Aaid(String),
    /// Hex SHA-1 of the attestation certificate's public key.
    AttestationKeyId(String),
}

impl fmt::Display for MetadataIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataIdentifier::Aaguid(aaguid) => write!(f, "aaguid:{aaguid}"),
            MetadataIdentifier::Aaid(aaid) => write!(f, "aaid:{aaid}"),
            MetadataIdentifier::AttestationKeyId(key_id) => write!(f, "key-id:{key_id}"),
        }
    }
}

impl RegistrationResult {
    /// The identifier to look metadata up by: the AAGUID when non-zero, else the
    /// attestation key identifier of a certificate trust path.
    pub fn identifier(&self) -> Result<Option<MetadataIdentifier>> {
        if !self.aaguid.is_zero_aaguid() {
            return Ok(Some(MetadataIdentifier::Aaguid(self.aaguid)));
        }
        match self.trust_path.leaf() {
            Some(leaf) => Ok(Some(MetadataIdentifier::AttestationKeyId(
                leaf.public_key_identifier()?,
            ))),
            None => Ok(None),
        }
    }
}

/// Verifies the statement of `object` with its registered format and collects
/// what the relying party stores for the new credential.
#[instrument(level = "debug", skip_all, fields(format = object.format()))]
pub fn verify_registration(
    registry: &AttestationFormatRegistry,
    object: &AttestationObject,
    client_data_hash: &[u8],
) -> Result<RegistrationResult> {
    let auth_data = object.auth_data();
    let credential = auth_data.attested_credential().map_err(|_| {
        FidelisError::verification("Registration authenticator data has no attested credential")
    })?;

    let statement = registry.create_statement(object)?;
    let verifier = registry.get_verifier(object.format())?;
    let result = verifier.verify(statement.as_ref(), auth_data, client_data_hash)?;
    debug!(attestation_type = %result.attestation_type, "Attestation statement verified");

    Ok(RegistrationResult {
        credential_id: credential.credential_id.clone(),
        public_key: credential.public_key.clone(),
        format: object.format().to_string(),
        attestation_type: result.attestation_type,
        trust_path: result.trust_path,
        sign_count: auth_data.sign_count(),
        aaguid: credential.aaguid,
        user_verified: auth_data.is_user_verified(),
    })
}
