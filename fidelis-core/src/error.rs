use thiserror::Error;

/// Coarse classification of a [`FidelisError`], for callers that branch on the
/// kind of failure rather than on the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Verification,
    Unsupported,
    FormatNotSupported,
    Configuration,
    Remote,
    NotAvailable,
    Cache,
}

#[derive(Error, Debug)]
pub enum FidelisError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("CBOR error: {0}")]
    Cbor(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Untrusted: {reason}")]
    Untrusted { reason: String },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Attestation format not supported: {0}")]
    FormatNotSupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl FidelisError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn cbor(message: impl Into<String>) -> Self {
        Self::Cbor(message.into())
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::Verification(message.into())
    }

    pub fn untrusted(reason: impl Into<String>) -> Self {
        Self::Untrusted {
            reason: reason.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable(message.into())
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) | Self::Cbor(_) => ErrorKind::Parse,
            Self::Verification(_) | Self::Untrusted { .. } => ErrorKind::Verification,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::FormatNotSupported(_) => ErrorKind::FormatNotSupported,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Remote(_) => ErrorKind::Remote,
            Self::NotAvailable(_) => ErrorKind::NotAvailable,
            Self::Cache(_) => ErrorKind::Cache,
        }
    }

    /// True for cryptographic and trust-policy failures, including untrusted verdicts.
    pub fn is_verification_failure(&self) -> bool {
        self.kind() == ErrorKind::Verification
    }

    pub fn is_untrusted(&self) -> bool {
        matches!(self, Self::Untrusted { .. })
    }
}

pub type Result<T> = std::result::Result<T, FidelisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrusted_is_a_verification_failure() {
        let err = FidelisError::untrusted("revoked");
        assert!(err.is_verification_failure());
        assert!(err.is_untrusted());
        assert_eq!(err.to_string(), "Untrusted: revoked");
    }

    #[test]
    fn test_cbor_errors_are_parse_errors() {
        assert_eq!(FidelisError::cbor("duplicate key").kind(), ErrorKind::Parse);
        assert!(!FidelisError::parse("x").is_verification_failure());
    }
}
