//! Built-in trust voters.

use std::sync::Arc;

use super::voter::{TrustVote, TrustVoter};
use crate::attestation::{AttestationType, VerificationResult};
use crate::metadata::Metadata;
use crate::pki::{ChainValidator, SignatureChainValidator, TrustPath, TrustPathValidator};
use crate::registration::RegistrationResult;

/// Vetoes attestation types the metadata does not declare. Type `none` is
/// never declared by metadata and is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportedAttestationTypeVoter;

impl TrustVoter for SupportedAttestationTypeVoter {
    fn name(&self) -> &str {
        "supported-attestation-type"
    }

    fn vote(&self, registration: &RegistrationResult, metadata: Option<&Metadata>) -> TrustVote {
        let attestation_type = registration.attestation_type;
        match metadata {
            Some(metadata)
                if attestation_type != AttestationType::None
                    && !metadata.attestation_types.is_empty()
                    && !metadata.supports_attestation_type(attestation_type) =>
            {
                TrustVote::untrusted(format!(
                    "Attestation type {attestation_type} is not supported by the authenticator metadata"
                ))
            }
            _ => TrustVote::Abstain,
        }
    }
}

/// Trusts every registration of one attestation type.
#[derive(Debug, Clone, Copy)]
pub struct TrustAttestationTypeVoter {
    trusted_type: AttestationType,
}

impl TrustAttestationTypeVoter {
    pub fn new(trusted_type: AttestationType) -> Self {
        Self { trusted_type }
    }
}

impl TrustVoter for TrustAttestationTypeVoter {
    fn name(&self) -> &str {
        "trust-attestation-type"
    }

    fn vote(&self, registration: &RegistrationResult, _: Option<&Metadata>) -> TrustVote {
        if registration.attestation_type == self.trusted_type {
            TrustVote::Trusted
        } else {
            TrustVote::Abstain
        }
    }
}

/// Trusts a trust path that chains to one of the metadata's anchors.
#[derive(Clone)]
pub struct TrustChainVoter {
    validator: TrustPathValidator,
}

impl TrustChainVoter {
    pub fn new(chain_validator: Arc<dyn ChainValidator>) -> Self {
        Self {
            validator: TrustPathValidator::new(chain_validator),
        }
    }
}

impl Default for TrustChainVoter {
    fn default() -> Self {
        Self::new(Arc::new(SignatureChainValidator::new()))
    }
}

impl TrustVoter for TrustChainVoter {
    fn name(&self) -> &str {
        "trust-chain"
    }

    fn vote(&self, registration: &RegistrationResult, metadata: Option<&Metadata>) -> TrustVote {
        let metadata = match metadata {
            Some(metadata) => metadata,
            None => return TrustVote::Abstain,
        };
        if matches!(registration.trust_path, TrustPath::Empty) {
            return TrustVote::Abstain;
        }

        let result = VerificationResult::new(
            registration.attestation_type,
            registration.trust_path.clone(),
        );
        if metadata.trust_anchors.is_trusted(&result, &self.validator) {
            TrustVote::Trusted
        } else {
            TrustVote::Abstain
        }
    }
}

/// Vetoes authenticators with a revoked or compromised status report.
#[derive(Debug, Clone, Copy, Default)]
pub struct UndesiredStatusReportVoter;

impl TrustVoter for UndesiredStatusReportVoter {
    fn name(&self) -> &str {
        "undesired-status-report"
    }

    fn vote(&self, _: &RegistrationResult, metadata: Option<&Metadata>) -> TrustVote {
        match metadata.and_then(Metadata::undesired_status) {
            Some(report) => TrustVote::untrusted(format!(
                "Authenticator status report is {}",
                report.status
            )),
            None => TrustVote::Abstain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aaguid::Aaguid;
    use crate::buffer::ByteBuffer;
    use crate::metadata::{AuthenticatorStatus, MetadataStatement, StatusReport};
    use crate::test_support::{cose_key, params, TestCa};

    fn registration(attestation_type: AttestationType, trust_path: TrustPath) -> RegistrationResult {
        RegistrationResult {
            credential_id: ByteBuffer::new(vec![1]),
            public_key: cose_key(1),
            format: "packed".into(),
            attestation_type,
            trust_path,
            sign_count: 0,
            aaguid: Aaguid::zero(),
            user_verified: true,
        }
    }

    fn metadata(types: &[&str], roots: &[&TestCa], reports: Vec<StatusReport>) -> Metadata {
        let statement: MetadataStatement = serde_json::from_value(serde_json::json!({
            "description": "Test Authenticator",
            "attestationTypes": types,
            "attestationRootCertificates": roots
                .iter()
                .map(|ca| ca.cert.der().to_base64())
                .collect::<Vec<_>>(),
        }))
        .unwrap();
        Metadata::from_statement(statement, reports).unwrap()
    }

    #[test]
    fn test_supported_attestation_type() {
        let voter = SupportedAttestationTypeVoter;
        let basic = registration(AttestationType::Basic, TrustPath::Empty);
        let attca = registration(AttestationType::AttCa, TrustPath::Empty);
        let none = registration(AttestationType::None, TrustPath::Empty);
        let declared = metadata(&["basic_full"], &[], vec![]);

        assert_eq!(voter.vote(&basic, Some(&declared)), TrustVote::Abstain);
        assert!(matches!(voter.vote(&attca, Some(&declared)), TrustVote::Untrusted(_)));
        assert_eq!(voter.vote(&none, Some(&declared)), TrustVote::Abstain, "none is ignored");
        assert_eq!(voter.vote(&attca, None), TrustVote::Abstain);
        assert_eq!(
            voter.vote(&attca, Some(&metadata(&[], &[], vec![]))),
            TrustVote::Abstain,
            "nothing declared"
        );
    }

    #[test]
    fn test_trust_attestation_type() {
        let voter = TrustAttestationTypeVoter::new(AttestationType::SelfAttestation);
        assert_eq!(
            voter.vote(&registration(AttestationType::SelfAttestation, TrustPath::Empty), None),
            TrustVote::Trusted
        );
        assert_eq!(
            voter.vote(&registration(AttestationType::None, TrustPath::Empty), None),
            TrustVote::Abstain
        );
    }

    #[test]
    fn test_trust_chain() {
        let root = TestCa::root("Vendor Root", 1);
        let other = TestCa::root("Other Root", 2);
        let leaf = root.issue(params("Attestation"), 3);
        let chained = registration(
            AttestationType::Basic,
            TrustPath::CertificateChain(vec![leaf]),
        );
        let voter = TrustChainVoter::default();

        assert_eq!(
            voter.vote(&chained, Some(&metadata(&[], &[&other, &root], vec![]))),
            TrustVote::Trusted
        );
        assert_eq!(voter.vote(&chained, Some(&metadata(&[], &[&other], vec![]))), TrustVote::Abstain);
        assert_eq!(voter.vote(&chained, None), TrustVote::Abstain);
        assert_eq!(
            voter.vote(
                &registration(AttestationType::SelfAttestation, TrustPath::Empty),
                Some(&metadata(&[], &[&root], vec![]))
            ),
            TrustVote::Abstain
        );
    }

    #[test]
    fn test_undesired_status_report() {
        let voter = UndesiredStatusReportVoter;
        let reg = registration(AttestationType::Basic, TrustPath::Empty);
        let fine = metadata(&[], &[], vec![StatusReport::new(AuthenticatorStatus::FidoCertified)]);
        let revoked = metadata(
            &[],
            &[],
            vec![
                StatusReport::new(AuthenticatorStatus::FidoCertified),
                StatusReport::new(AuthenticatorStatus::Revoked),
            ],
        );

        assert_eq!(voter.vote(&reg, Some(&fine)), TrustVote::Abstain);
        assert_eq!(
            voter.vote(&reg, Some(&revoked)),
            TrustVote::untrusted("Authenticator status report is REVOKED")
        );
        assert_eq!(voter.vote(&reg, None), TrustVote::Abstain);
    }
}
