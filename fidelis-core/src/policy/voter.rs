use std::fmt;

use crate::metadata::Metadata;
use crate::registration::RegistrationResult;

/// One voter's opinion of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustVote {
    /// No opinion.
    Abstain,
    Trusted,
    /// Vetoes the registration.
    Untrusted(String),
}

impl TrustVote {
    pub fn untrusted(reason: impl Into<String>) -> Self {
        TrustVote::Untrusted(reason.into())
    }
}

impl fmt::Display for TrustVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustVote::Abstain => f.write_str("abstain"),
            TrustVote::Trusted => f.write_str("trusted"),
            TrustVote::Untrusted(reason) => write!(f, "untrusted ({reason})"),
        }
    }
}

pub trait TrustVoter: Send + Sync {
    fn name(&self) -> &str;

    fn vote(&self, registration: &RegistrationResult, metadata: Option<&Metadata>) -> TrustVote;
}
