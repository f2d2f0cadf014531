use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::formats::{
    AndroidKeyFormat, AndroidSafetyNetFormat, AppleFormat, FidoU2fFormat, NoneFormat,
    PackedFormat, TpmFormat,
};
use super::object::AttestationObject;
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{FidelisError, Result};
use crate::pki::TrustPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationType {
    None,
    SelfAttestation,
    Basic,
    AttCa,
    AnonCa,
    Ecdaa,
}

impl fmt::Display for AttestationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttestationType::None => "none",
            AttestationType::SelfAttestation => "self",
            AttestationType::Basic => "basic",
            AttestationType::AttCa => "attca",
            AttestationType::AnonCa => "anonca",
            AttestationType::Ecdaa => "ecdaa",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful statement verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub attestation_type: AttestationType,
    pub trust_path: TrustPath,
}

impl VerificationResult {
    pub fn new(attestation_type: AttestationType, trust_path: TrustPath) -> Self {
        Self {
            attestation_type,
            trust_path,
        }
    }
}

/// A format-specific typed view over an `attStmt` map.
pub trait AttestationStatement: fmt::Debug + Send + Sync {
    fn format_id(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

pub trait AttestationVerifier: Send + Sync {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult>;
}

/// A registered attestation statement format.
pub trait AttestationFormat: Send + Sync {
    fn format_id(&self) -> &str;
    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>>;
    fn verifier(&self) -> Arc<dyn AttestationVerifier>;
}

/// Format id to format lookup. Adding a format is a [`register`](Self::register) call.
#[derive(Clone, Default)]
pub struct AttestationFormatRegistry {
    formats: HashMap<String, Arc<dyn AttestationFormat>>,
}

impl AttestationFormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in format with default settings.
    pub fn with_default_formats() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NoneFormat));
        registry.register(Arc::new(FidoU2fFormat));
        registry.register(Arc::new(PackedFormat));
        registry.register(Arc::new(TpmFormat));
        registry.register(Arc::new(AndroidKeyFormat::default()));
        registry.register(Arc::new(AndroidSafetyNetFormat::default()));
        registry.register(Arc::new(AppleFormat));
        registry
    }

    /// Registers a format, replacing any previous one with the same id.
    pub fn register(&mut self, format: Arc<dyn AttestationFormat>) {
        self.formats.insert(format.format_id().to_string(), format);
    }

    pub fn is_supported(&self, format_id: &str) -> bool {
        self.formats.contains_key(format_id)
    }

    pub fn format_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.formats.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn format(&self, format_id: &str) -> Result<&Arc<dyn AttestationFormat>> {
        self.formats
            .get(format_id)
            .ok_or_else(|| FidelisError::FormatNotSupported(format_id.to_string()))
    }

    pub fn create_statement(&self, object: &AttestationObject) -> Result<Box<dyn AttestationStatement>> {
        let format = self.format(object.format())?;
        debug!(format = object.format(), "Creating attestation statement");
        format.create_statement(object.statement())
    }

    pub fn get_verifier(&self, format_id: &str) -> Result<Arc<dyn AttestationVerifier>> {
        Ok(self.format(format_id)?.verifier())
    }
}

/// Downcast a statement to the concrete type a verifier expects.
pub(crate) fn downcast_statement<'a, T: 'static>(
    statement: &'a dyn AttestationStatement,
    expected: &str,
) -> Result<&'a T> {
    statement.as_any().downcast_ref::<T>().ok_or_else(|| {
        FidelisError::verification(format!(
            "Expected a {expected} statement, got {}",
            statement.format_id()
        ))
    })
}
