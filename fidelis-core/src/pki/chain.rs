//! Cryptographic certificate chain validation.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::certificate::X509Certificate;
use crate::error::Result;

/// Validates an ordered chain, root first and end-entity last.
pub trait ChainValidator: Send + Sync {
    fn validate_chain(&self, certificates_root_first: &[X509Certificate]) -> bool;
}

/// Checks issuer names, signatures, CA flags, path length constraints and
/// validity windows along the chain. The root is trusted as given; its own
/// signature is not checked.
#[derive(Debug, Clone, Default)]
pub struct SignatureChainValidator {
    validation_time: Option<DateTime<Utc>>,
}

impl SignatureChainValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate at a fixed instant instead of the current time.
    pub fn at(validation_time: DateTime<Utc>) -> Self {
        Self {
            validation_time: Some(validation_time),
        }
    }

    fn check(&self, chain: &[X509Certificate]) -> Result<std::result::Result<(), String>> {
        if chain.is_empty() {
            return Ok(Err("empty chain".to_string()));
        }
        let now = self.validation_time.unwrap_or_else(Utc::now);

        for (index, cert) in chain.iter().enumerate() {
            if !cert.is_valid_at(now)? {
                return Ok(Err(format!("certificate {index} is outside its validity period")));
            }
            if index == 0 {
                continue;
            }

            let issuer = &chain[index - 1];
            if issuer.is_ca()? != Some(true) {
                return Ok(Err(format!("certificate {} is not a CA", index - 1)));
            }
            if let Some(max_path_len) = issuer.path_len_constraint()? {
                // Intermediates below the issuer, not counting the end entity.
                let below = chain.len().saturating_sub(index + 1);
                if below > max_path_len as usize {
                    return Ok(Err(format!(
                        "certificate {} allows {max_path_len} intermediates, found {below}",
                        index - 1
                    )));
                }
            }
            if !cert.verify_issued_by(issuer)? {
                return Ok(Err(format!(
                    "certificate {index} is not signed by certificate {}",
                    index - 1
                )));
            }
        }
        Ok(Ok(()))
    }
}

impl ChainValidator for SignatureChainValidator {
    fn validate_chain(&self, certificates_root_first: &[X509Certificate]) -> bool {
        match self.check(certificates_root_first) {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                debug!(reason = %reason, "Certificate chain rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "Certificate chain could not be evaluated");
                false
            }
        }
    }
}
