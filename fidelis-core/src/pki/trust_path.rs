use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::certificate::X509Certificate;
use super::chain::ChainValidator;
use super::trust_anchor::TrustAnchor;
use crate::buffer::ByteBuffer;

/// How an attestation proves its authenticity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TrustPath {
    /// No evidence (none and self attestation).
    #[default]
    Empty,
    /// Certificates in leaf-first order, as carried by `x5c`.
    CertificateChain(Vec<X509Certificate>),
    EcdaaKeyId(ByteBuffer),
}

impl TrustPath {
    pub fn certificates(&self) -> &[X509Certificate] {
        match self {
            TrustPath::CertificateChain(certs) => certs,
            _ => &[],
        }
    }

    pub fn leaf(&self) -> Option<&X509Certificate> {
        self.certificates().first()
    }
}

/// Checks a trust path against a certificate anchor.
#[derive(Clone)]
pub struct TrustPathValidator {
    chain_validator: Arc<dyn ChainValidator>,
}

impl TrustPathValidator {
    pub fn new(chain_validator: Arc<dyn ChainValidator>) -> Self {
        Self { chain_validator }
    }

    /// Only a certificate chain checked against a certificate anchor can be
    /// trusted; every other combination is not.
    pub fn validate(&self, trust_path: &TrustPath, anchor: &TrustAnchor) -> bool {
        let (path, root) = match (trust_path, anchor) {
            (TrustPath::CertificateChain(path), TrustAnchor::Certificate(root)) => (path, root),
            _ => return false,
        };
        if path.is_empty() {
            return false;
        }

        if path.len() == 1 && &path[0] == root {
            debug!("Trust path is the anchor certificate itself");
            return true;
        }

        let chain: Vec<X509Certificate> = std::iter::once(root.clone())
            .chain(path.iter().rev().cloned())
            .collect();

        let mut seen = HashSet::with_capacity(chain.len());
        if !chain.iter().all(|cert| seen.insert(cert.der().as_slice())) {
            debug!("Trust path contains a duplicate certificate");
            return false;
        }

        self.chain_validator.validate_chain(&chain)
    }
}
