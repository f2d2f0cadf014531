use tracing::{debug, instrument};

use super::voter::{TrustVote, TrustVoter};
use crate::error::{FidelisError, Result};
use crate::metadata::Metadata;
use crate::registration::RegistrationResult;

/// Runs voters in registration order. Any untrusted vote ends the decision;
/// otherwise at least one voter must have trusted the registration.
#[derive(Default)]
pub struct TrustDecisionManager {
    voters: Vec<Box<dyn TrustVoter>>,
}

impl TrustDecisionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voter(&mut self, voter: Box<dyn TrustVoter>) {
        self.voters.push(voter);
    }

    pub fn with_voter(mut self, voter: Box<dyn TrustVoter>) -> Self {
        self.add_voter(voter);
        self
    }

    pub fn voter_names(&self) -> Vec<&str> {
        self.voters.iter().map(|v| v.name()).collect()
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(attestation_type = %registration.attestation_type, has_metadata = metadata.is_some())
    )]
    pub fn verify_trust(
        &self,
        registration: &RegistrationResult,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        let mut trusted = false;
        for voter in &self.voters {
            let vote = voter.vote(registration, metadata);
            debug!(voter = voter.name(), vote = %vote, "Trust vote");
            match vote {
                TrustVote::Untrusted(reason) => return Err(FidelisError::untrusted(reason)),
                TrustVote::Trusted => trusted = true,
                TrustVote::Abstain => {}
            }
        }

        if trusted {
            Ok(())
        } else {
            Err(FidelisError::untrusted("No voter trusted the registration"))
        }
    }
}
