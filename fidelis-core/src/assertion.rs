//! Assertion (credential use) verification.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::credential_store::CredentialStore;
use crate::error::{FidelisError, Result};

/// The parts of an authentication response checked against the stored credential.
#[derive(Debug, Clone)]
pub struct AssertionRequest {
    pub credential_id: ByteBuffer,
    pub authenticator_data: ByteBuffer,
    pub client_data_hash: Vec<u8>,
    pub signature: ByteBuffer,
    /// `userHandle` returned by the authenticator, when present.
    pub user_handle: Option<ByteBuffer>,
    /// SHA-256 of the relying party id, when the caller wants it checked.
    pub expected_rp_id_hash: Option<ByteBuffer>,
    pub require_user_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub credential_id: ByteBuffer,
    pub sign_count: u32,
    pub user_verified: bool,
}

pub struct AssertionVerifier {
    store: Arc<dyn CredentialStore>,
}

impl AssertionVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Verifies the assertion and records its signature counter.
    #[instrument(level = "debug", skip_all, fields(credential = %request.credential_id.to_base64_url()))]
    pub fn verify(&self, request: &AssertionRequest) -> Result<AssertionResult> {
        let credential = self
            .store
            .find_credential(&request.credential_id)?
            .ok_or_else(|| FidelisError::verification("Unknown credential"))?;

        if let Some(user_handle) = &request.user_handle {
            if user_handle != &credential.user_handle {
                return Err(FidelisError::verification(
                    "User handle does not own the credential",
                ));
            }
        }

        let auth_data = AuthenticatorData::parse(request.authenticator_data.clone())?;
        if let Some(expected) = &request.expected_rp_id_hash {
            if auth_data.rp_id_hash() != expected {
                return Err(FidelisError::verification("RP id hash does not match"));
            }
        }
        if !auth_data.is_user_present() {
            return Err(FidelisError::verification("User presence flag is not set"));
        }
        if request.require_user_verification && !auth_data.is_user_verified() {
            return Err(FidelisError::verification("User verification is required"));
        }

        let mut message = request.authenticator_data.as_slice().to_vec();
        message.extend_from_slice(&request.client_data_hash);
        if !credential
            .public_key
            .verify_signature(&message, request.signature.as_slice())?
        {
            return Err(FidelisError::verification("Invalid assertion signature"));
        }

        let stored_count = self.store.get_signature_counter(&request.credential_id)?;
        let sign_count = auth_data.sign_count();
        if (sign_count != 0 || stored_count != 0) && sign_count <= stored_count {
            warn!(
                stored = stored_count,
                received = sign_count,
                "Signature counter did not increase, the authenticator may be cloned"
            );
            return Err(FidelisError::verification(format!(
                "Signature counter {sign_count} is not greater than {stored_count}"
            )));
        }
        self.store
            .update_signature_counter(&request.credential_id, sign_count)?;
        debug!(sign_count, "Assertion verified");

        Ok(AssertionResult {
            credential_id: request.credential_id.clone(),
            sign_count,
            user_verified: auth_data.is_user_verified(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aaguid::Aaguid;
    use crate::authenticator_data::{FLAG_UP, FLAG_UV};
    use crate::credential_store::{MemoryCredentialStore, StoredCredential};
    use crate::test_support::{cose_key, sign};

    const CREDENTIAL_ID: [u8; 4] = [0xc0, 0xff, 0xee, 0x00];

    fn verifier(stored_count: u32) -> (AssertionVerifier, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        store
            .register_credential(StoredCredential {
                credential_id: ByteBuffer::new(CREDENTIAL_ID.to_vec()),
                user_handle: ByteBuffer::new(b"alice".to_vec()),
                public_key: cose_key(12),
                sign_count: stored_count,
                aaguid: Aaguid::zero(),
            })
            .unwrap();
        (AssertionVerifier::new(store.clone()), store)
    }

    fn request(flags: u8, counter: u32, signer: u8) -> AssertionRequest {
        let mut auth_data = vec![0x5e; 32];
        auth_data.push(flags);
        auth_data.extend_from_slice(&counter.to_be_bytes());
        let client_data_hash = vec![0x24; 32];
        let mut message = auth_data.clone();
        message.extend_from_slice(&client_data_hash);

        AssertionRequest {
            credential_id: ByteBuffer::new(CREDENTIAL_ID.to_vec()),
            signature: ByteBuffer::new(sign(signer, &message)),
            authenticator_data: ByteBuffer::new(auth_data),
            client_data_hash,
            user_handle: Some(ByteBuffer::new(b"alice".to_vec())),
            expected_rp_id_hash: Some(ByteBuffer::new(vec![0x5e; 32])),
            require_user_verification: false,
        }
    }

    #[test]
    fn test_valid_assertion_updates_counter() {
        let (verifier, store) = verifier(4);
        let result = verifier.verify(&request(FLAG_UP | FLAG_UV, 5, 12)).unwrap();
        assert_eq!(result.sign_count, 5);
        assert!(result.user_verified);
        assert_eq!(
            store
                .get_signature_counter(&ByteBuffer::new(CREDENTIAL_ID.to_vec()))
                .unwrap(),
            5
        );
    }

    #[test]
    fn test_counter_must_increase() {
        let (verifier, _) = verifier(4);
        let err = verifier.verify(&request(FLAG_UP, 4, 12)).unwrap_err();
        assert!(err.to_string().contains("not greater"), "got: {err}");
    }

    #[test]
    fn test_zero_counters_are_accepted() {
        let (verifier, _) = verifier(0);
        assert!(verifier.verify(&request(FLAG_UP, 0, 12)).is_ok());
        assert!(verifier.verify(&request(FLAG_UP, 0, 12)).is_ok(), "counter unsupported");
    }

    #[test]
    fn test_user_presence_required() {
        let (verifier, _) = verifier(0);
        let err = verifier.verify(&request(0, 1, 12)).unwrap_err();
        assert!(err.to_string().contains("presence"), "got: {err}");

        let mut uv_request = request(FLAG_UP, 1, 12);
        uv_request.require_user_verification = true;
        assert!(verifier.verify(&uv_request).is_err());
    }

    #[test]
    fn test_wrong_signer_and_owner() {
        let (verifier, _) = verifier(0);
        let err = verifier.verify(&request(FLAG_UP, 1, 13)).unwrap_err();
        assert!(err.to_string().contains("signature"), "got: {err}");

        let mut other_user = request(FLAG_UP, 1, 12);
        other_user.user_handle = Some(ByteBuffer::new(b"mallory".to_vec()));
        assert!(verifier.verify(&other_user).is_err());

        let mut other_rp = request(FLAG_UP, 1, 12);
        other_rp.expected_rp_id_hash = Some(ByteBuffer::new(vec![0; 32]));
        assert!(verifier.verify(&other_rp).is_err());
    }
}
