use std::any::Any;
use std::sync::Arc;

use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{FidelisError, Result};
use crate::pki::TrustPath;

const FORMAT_ID: &str = "none";

/// No attestation. The statement is an empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoneStatement;

impl AttestationStatement for NoneStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for NoneFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        if !statement.is_empty() {
            return Err(FidelisError::parse(format!(
                "The 'none' attestation statement must be empty, found {} entries",
                statement.len()
            )));
        }
        Ok(Box::new(NoneStatement))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for NoneFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        _auth_data: &AuthenticatorData,
        _client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        downcast_statement::<NoneStatement>(statement, FORMAT_ID)?;
        Ok(VerificationResult::new(AttestationType::None, TrustPath::Empty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::CborValue;

    #[test]
    fn test_non_empty_statement_rejected() {
        let statement = CborMap::new()
            .with(CborValue::text("sig"), CborValue::bytes(vec![1]))
            .unwrap();
        let err = NoneFormat.create_statement(&statement).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
        assert!(NoneFormat.create_statement(&CborMap::new()).is_ok());
    }
}
