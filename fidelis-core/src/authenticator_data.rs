//! Authenticator data (WebAuthn section 6.1).
//!
//! ```text
//! rpIdHash (32) | flags (1) | signCount (4, big-endian)
//!   [AT] aaguid (16) | credentialIdLength (2) | credentialId | COSE key
//!   [ED] CBOR extensions map
//! ```

use crate::aaguid::{Aaguid, AAGUID_LENGTH};
use crate::buffer::ByteBuffer;
use crate::cbor::{self, CborMap, CborValue};
use crate::cose::CoseKey;
use crate::error::{FidelisError, Result};

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
pub const FLAG_BE: u8 = 0x08;
pub const FLAG_BS: u8 = 0x10;
pub const FLAG_AT: u8 = 0x40;
pub const FLAG_ED: u8 = 0x80;

const RP_ID_HASH_LENGTH: usize = 32;
const HEADER_LENGTH: usize = RP_ID_HASH_LENGTH + 1 + 4;

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    pub aaguid: Aaguid,
    pub credential_id: ByteBuffer,
    pub public_key: CoseKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    raw: ByteBuffer,
    rp_id_hash: ByteBuffer,
    flags: u8,
    sign_count: u32,
    attested_credential: Option<AttestedCredentialData>,
    extensions: Option<CborMap>,
}

impl AuthenticatorData {
    /// Parses the whole buffer; any byte left after the declared blocks is an error.
    pub fn parse(raw: ByteBuffer) -> Result<Self> {
        if raw.len() < HEADER_LENGTH {
            return Err(FidelisError::parse(format!(
                "Authenticator data must be at least {HEADER_LENGTH} bytes, got {}",
                raw.len()
            )));
        }

        let rp_id_hash = raw.get_bytes(0, RP_ID_HASH_LENGTH)?;
        let flags = raw.get_u8(RP_ID_HASH_LENGTH)?;
        let sign_count = raw.get_u32(RP_ID_HASH_LENGTH + 1)?;
        let mut offset = HEADER_LENGTH;

        let attested_credential = if flags & FLAG_AT != 0 {
            let aaguid = Aaguid::from_bytes(raw.slice(offset, AAGUID_LENGTH)?)?;
            offset += AAGUID_LENGTH;
            let id_length = raw.get_u16(offset)? as usize;
            offset += 2;
            let credential_id = raw.get_bytes(offset, id_length)?;
            offset += id_length;
            let (public_key, end) = CoseKey::parse_in_place(&raw, offset)?;
            offset = end;
            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                public_key,
            })
        } else {
            None
        };

        let extensions = if flags & FLAG_ED != 0 {
            let (value, end) = cbor::decode_in_place(&raw, offset)?;
            offset = end;
            match value {
                CborValue::Map(map) => Some(map),
                other => {
                    return Err(FidelisError::parse(format!(
                        "Authenticator extensions must be a map, found {}",
                        other.type_name()
                    )))
                }
            }
        } else {
            None
        };

        if offset != raw.len() {
            return Err(FidelisError::parse(format!(
                "Unexpected bytes at end of authenticator data ({} unused)",
                raw.len() - offset
            )));
        }

        Ok(Self {
            raw,
            rp_id_hash,
            flags,
            sign_count,
            attested_credential,
            extensions,
        })
    }

    pub fn raw(&self) -> &ByteBuffer {
        &self.raw
    }

    pub fn rp_id_hash(&self) -> &ByteBuffer {
        &self.rp_id_hash
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_user_present(&self) -> bool {
        self.flags & FLAG_UP != 0
    }

    pub fn is_user_verified(&self) -> bool {
        self.flags & FLAG_UV != 0
    }

    pub fn is_backup_eligible(&self) -> bool {
        self.flags & FLAG_BE != 0
    }

    pub fn is_backed_up(&self) -> bool {
        self.flags & FLAG_BS != 0
    }

    pub fn has_attested_credential_data(&self) -> bool {
        self.attested_credential.is_some()
    }

    pub fn has_extension_data(&self) -> bool {
        self.extensions.is_some()
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn attested_credential(&self) -> Result<&AttestedCredentialData> {
        self.attested_credential
            .as_ref()
            .ok_or_else(|| FidelisError::not_available("authenticator data has no attested credential"))
    }

    pub fn aaguid(&self) -> Result<Aaguid> {
        Ok(self.attested_credential()?.aaguid)
    }

    pub fn credential_id(&self) -> Result<&ByteBuffer> {
        Ok(&self.attested_credential()?.credential_id)
    }

    pub fn credential_public_key(&self) -> Result<&CoseKey> {
        Ok(&self.attested_credential()?.public_key)
    }

    pub fn extensions(&self) -> Result<&CborMap> {
        self.extensions
            .as_ref()
            .ok_or_else(|| FidelisError::not_available("authenticator data has no extensions"))
    }
}
