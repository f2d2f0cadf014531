//! Credential persistence seam.

use dashmap::DashMap;

use crate::aaguid::Aaguid;
use crate::buffer::ByteBuffer;
use crate::cose::CoseKey;
use crate::error::{FidelisError, Result};
use crate::registration::RegistrationResult;

/// What a relying party keeps for a registered credential.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredential {
    pub credential_id: ByteBuffer,
    pub user_handle: ByteBuffer,
    pub public_key: CoseKey,
    pub sign_count: u32,
    pub aaguid: Aaguid,
}

impl StoredCredential {
    pub fn from_registration(registration: &RegistrationResult, user_handle: ByteBuffer) -> Self {
        Self {
            credential_id: registration.credential_id.clone(),
            user_handle,
            public_key: registration.public_key.clone(),
            sign_count: registration.sign_count,
            aaguid: registration.aaguid,
        }
    }
}

/// Storage for registered credentials. Implementations are shared across
/// requests and must be safe to call concurrently.
pub trait CredentialStore: Send + Sync {
    fn find_credential(&self, credential_id: &ByteBuffer) -> Result<Option<StoredCredential>>;

    fn register_credential(&self, credential: StoredCredential) -> Result<()>;

    fn get_signature_counter(&self, credential_id: &ByteBuffer) -> Result<u32>;

    fn update_signature_counter(&self, credential_id: &ByteBuffer, counter: u32) -> Result<()>;

    fn get_user_credential_ids(&self, user_handle: &ByteBuffer) -> Result<Vec<ByteBuffer>>;
}

/// In-process store, for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<ByteBuffer, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn find_credential(&self, credential_id: &ByteBuffer) -> Result<Option<StoredCredential>> {
        Ok(self.credentials.get(credential_id).map(|entry| entry.clone()))
    }

    fn register_credential(&self, credential: StoredCredential) -> Result<()> {
        match self.credentials.entry(credential.credential_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(FidelisError::verification(format!(
                "Credential {} is already registered",
                credential.credential_id.to_base64_url()
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(credential);
                Ok(())
            }
        }
    }

    fn get_signature_counter(&self, credential_id: &ByteBuffer) -> Result<u32> {
        self.credentials
            .get(credential_id)
            .map(|entry| entry.sign_count)
            .ok_or_else(|| unknown_credential(credential_id))
    }

    fn update_signature_counter(&self, credential_id: &ByteBuffer, counter: u32) -> Result<()> {
        let mut entry = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| unknown_credential(credential_id))?;
        entry.sign_count = counter;
        Ok(())
    }

    fn get_user_credential_ids(&self, user_handle: &ByteBuffer) -> Result<Vec<ByteBuffer>> {
        let mut ids: Vec<ByteBuffer> = self
            .credentials
            .iter()
            .filter(|entry| &entry.user_handle == user_handle)
            .map(|entry| entry.credential_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn unknown_credential(credential_id: &ByteBuffer) -> FidelisError {
    FidelisError::not_available(format!(
        "Unknown credential {}",
        credential_id.to_base64_url()
    ))
}
