//! Built-in attestation statement formats.

mod android_key;
mod android_safetynet;
mod apple;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

pub use android_key::{AndroidKeyFormat, AndroidKeyStatement};
pub use android_safetynet::{AndroidSafetyNetFormat, SafetyNetResponse, SafetyNetStatement};
pub use apple::{AppleFormat, AppleStatement};
pub use fido_u2f::{FidoU2fFormat, FidoU2fStatement};
pub use none::{NoneFormat, NoneStatement};
pub use packed::{PackedFormat, PackedStatement};
pub use tpm::{TpmFormat, TpmStatement};

use crate::asn1::{self, OID_FIDO_GEN_CE_AAGUID};
use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::{CoseAlgorithm, CoseKey};
use crate::error::{FidelisError, Result};
use crate::pki::X509Certificate;

/// The `x5c` array of a statement, leaf first. Must hold at least one certificate.
fn parse_x5c(statement: &CborMap) -> Result<Vec<X509Certificate>> {
    let entries = statement.require_array("x5c")?;
    if entries.is_empty() {
        return Err(FidelisError::parse("Field 'x5c' must not be empty"));
    }
    entries
        .iter()
        .map(|entry| {
            let der = entry
                .as_bytes()
                .ok_or_else(|| FidelisError::parse("Entries of 'x5c' must be byte strings"))?;
            X509Certificate::from_der(der.as_slice().to_vec())
        })
        .collect()
}

fn parse_alg(statement: &CborMap) -> Result<CoseAlgorithm> {
    CoseAlgorithm::from_id(statement.require_int("alg")?)
}

/// `authData || clientDataHash`
fn signed_data(auth_data: &AuthenticatorData, client_data_hash: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(auth_data.raw().len() + client_data_hash.len());
    data.extend_from_slice(auth_data.raw().as_slice());
    data.extend_from_slice(client_data_hash);
    data
}

fn verify_signature(key: &CoseKey, message: &[u8], signature: &ByteBuffer, what: &str) -> Result<()> {
    if key.verify_signature(message, signature.as_slice())? {
        Ok(())
    } else {
        Err(FidelisError::verification(format!("Invalid {what} signature")))
    }
}

/// When the certificate carries the FIDO AAGUID extension it must be
/// non-critical and name the authenticator data AAGUID.
fn check_aaguid_extension(certificate: &X509Certificate, auth_data: &AuthenticatorData) -> Result<()> {
    let Some(extension) = certificate.extension(OID_FIDO_GEN_CE_AAGUID)? else {
        return Ok(());
    };
    if extension.critical {
        return Err(FidelisError::verification(
            "The AAGUID certificate extension must not be critical",
        ));
    }
    let certificate_aaguid = asn1::parse_aaguid_extension(&extension.value)?;
    let aaguid = auth_data.aaguid()?;
    if certificate_aaguid != aaguid {
        return Err(FidelisError::verification(format!(
            "Certificate AAGUID {certificate_aaguid} does not match authenticator AAGUID {aaguid}"
        )));
    }
    Ok(())
}

/// The leaf key, tagged with the statement algorithm, must be the credential key.
fn check_leaf_is_credential_key(
    leaf: &X509Certificate,
    auth_data: &AuthenticatorData,
) -> Result<()> {
    let credential_key = auth_data.credential_public_key()?;
    let leaf_key = leaf.public_key(credential_key.algorithm())?;
    if !leaf_key.same_public_key(credential_key) {
        return Err(FidelisError::verification(
            "Certificate public key does not match the credential public key",
        ));
    }
    Ok(())
}
