use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::{self, CborMap, CborValue};
use crate::error::{FidelisError, Result};

/// The `{fmt, attStmt, authData}` map returned by credential creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    format: String,
    statement: CborMap,
    auth_data: AuthenticatorData,
}

impl AttestationObject {
    pub fn parse(buffer: &ByteBuffer) -> Result<Self> {
        let value = cbor::decode(buffer)?;
        let map = value
            .as_map()
            .ok_or_else(|| FidelisError::parse("Attestation object must be a CBOR map"))?;

        let format = map.require_text("fmt")?.to_string();
        let statement = match map.get_text_key("attStmt") {
            Some(CborValue::Map(statement)) => statement.clone(),
            Some(_) => return Err(FidelisError::parse("Field 'attStmt' must be a map")),
            None => return Err(FidelisError::parse("Missing field 'attStmt'")),
        };
        let auth_data = AuthenticatorData::parse(map.require_bytes("authData")?.clone())?;

        Ok(Self {
            format,
            statement,
            auth_data,
        })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn statement(&self) -> &CborMap {
        &self.statement
    }

    pub fn auth_data(&self) -> &AuthenticatorData {
        &self.auth_data
    }
}
