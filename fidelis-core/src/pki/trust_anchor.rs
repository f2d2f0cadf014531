use super::certificate::X509Certificate;
use super::trust_path::{TrustPath, TrustPathValidator};
use crate::attestation::{AttestationType, VerificationResult};

/// A root of trust an attestation can be checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    /// Trusts nothing.
    None,
    /// Accepts self attestation, where the credential key signs for itself
    /// and no certificates are presented.
    SelfAttestation,
    /// A root certificate the trust path must chain to.
    Certificate(X509Certificate),
}

impl TrustAnchor {
    pub fn is_trusted(&self, result: &VerificationResult, validator: &TrustPathValidator) -> bool {
        match self {
            TrustAnchor::None => false,
            TrustAnchor::SelfAttestation => {
                result.attestation_type == AttestationType::SelfAttestation
                    && matches!(result.trust_path, TrustPath::Empty)
            }
            TrustAnchor::Certificate(_) => validator.validate(&result.trust_path, self),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchorSet {
    anchors: Vec<TrustAnchor>,
}

impl TrustAnchorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, anchor: TrustAnchor) {
        self.anchors.push(anchor);
    }

    pub fn anchors(&self) -> &[TrustAnchor] {
        &self.anchors
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// True on the first anchor that trusts the result.
    pub fn is_trusted(&self, result: &VerificationResult, validator: &TrustPathValidator) -> bool {
        self.anchors
            .iter()
            .any(|anchor| anchor.is_trusted(result, validator))
    }
}

impl FromIterator<TrustAnchor> for TrustAnchorSet {
    fn from_iter<I: IntoIterator<Item = TrustAnchor>>(iter: I) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}
