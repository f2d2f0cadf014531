use std::fmt;

use tracing::debug;

use super::token::Jwt;
use super::x5c::{X5cParameter, X5cParameterReader};
use crate::cose::{CoseAlgorithm, CoseKey};
use crate::error::{FidelisError, Result};

/// JWS signature algorithms this crate can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JwsAlgorithm {
    Es256,
    Es384,
    Es512,
    Rs256,
    Rs384,
    Rs512,
}

impl JwsAlgorithm {
    pub const ALL: [JwsAlgorithm; 6] = [
        JwsAlgorithm::Es256,
        JwsAlgorithm::Es384,
        JwsAlgorithm::Es512,
        JwsAlgorithm::Rs256,
        JwsAlgorithm::Rs384,
        JwsAlgorithm::Rs512,
    ];

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == name)
            .ok_or_else(|| FidelisError::unsupported(format!("JWS algorithm {name}")))
    }

    pub fn name(self) -> &'static str {
        match self {
            JwsAlgorithm::Es256 => "ES256",
            JwsAlgorithm::Es384 => "ES384",
            JwsAlgorithm::Es512 => "ES512",
            JwsAlgorithm::Rs256 => "RS256",
            JwsAlgorithm::Rs384 => "RS384",
            JwsAlgorithm::Rs512 => "RS512",
        }
    }

    pub fn cose_algorithm(self) -> CoseAlgorithm {
        match self {
            JwsAlgorithm::Es256 => CoseAlgorithm::Es256,
            JwsAlgorithm::Es384 => CoseAlgorithm::Es384,
            JwsAlgorithm::Es512 => CoseAlgorithm::Es512,
            JwsAlgorithm::Rs256 => CoseAlgorithm::Rs256,
            JwsAlgorithm::Rs384 => CoseAlgorithm::Rs384,
            JwsAlgorithm::Rs512 => CoseAlgorithm::Rs512,
        }
    }

    /// Width of each of r and s in a raw ECDSA signature.
    pub fn component_width(self) -> Option<usize> {
        match self {
            JwsAlgorithm::Es256 => Some(32),
            JwsAlgorithm::Es384 => Some(48),
            JwsAlgorithm::Es512 => Some(66),
            _ => None,
        }
    }
}

impl fmt::Display for JwsAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a caller accepts when validating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    allowed_algorithms: Vec<JwsAlgorithm>,
}

impl ValidationContext {
    pub fn new(allowed_algorithms: impl IntoIterator<Item = JwsAlgorithm>) -> Self {
        Self {
            allowed_algorithms: allowed_algorithms.into_iter().collect(),
        }
    }

    pub fn allowed_algorithms(&self) -> &[JwsAlgorithm] {
        &self.allowed_algorithms
    }

    pub fn is_allowed(&self, algorithm: JwsAlgorithm) -> bool {
        self.allowed_algorithms.contains(&algorithm)
    }
}

impl Default for ValidationContext {
    /// Every ECDSA and RSA PKCS#1 algorithm.
    fn default() -> Self {
        Self::new(JwsAlgorithm::ALL)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JwtValidator;

impl JwtValidator {
    pub fn new() -> Self {
        Self
    }

    /// Checks the algorithm against `context` and the signature against `key`.
    pub fn validate(&self, jwt: &Jwt, context: &ValidationContext, key: &CoseKey) -> Result<()> {
        let algorithm = allowed_algorithm(jwt, context)?;
        if key.algorithm() != algorithm.cose_algorithm() {
            return Err(FidelisError::verification(format!(
                "Key algorithm {} does not match JWS algorithm {algorithm}",
                key.algorithm().name()
            )));
        }

        let signature = raw_to_der_signature(jwt.signature().as_slice(), algorithm)?;

        if !key.verify_signature(jwt.signed_data().as_slice(), &signature)? {
            return Err(FidelisError::verification("JWS signature is invalid"));
        }
        debug!(alg = %algorithm, "JWS signature verified");
        Ok(())
    }

    /// Validates a token signed by the leaf of its own `x5c` header and
    /// returns the certificates. The chain itself is not checked here.
    pub fn validate_x5c(&self, jwt: &Jwt, context: &ValidationContext) -> Result<X5cParameter> {
        allowed_algorithm(jwt, context)?;
        let x5c = X5cParameterReader::read(jwt)?
            .ok_or_else(|| FidelisError::verification("JWS has no x5c certificates"))?;
        self.validate(jwt, context, &x5c.cose_key)?;
        Ok(x5c)
    }
}

fn allowed_algorithm(jwt: &Jwt, context: &ValidationContext) -> Result<JwsAlgorithm> {
    let name = jwt.algorithm()?;
    match JwsAlgorithm::from_name(name) {
        Ok(algorithm) if context.is_allowed(algorithm) => Ok(algorithm),
        _ => Err(FidelisError::verification(format!("Algorithm not allowed: {name}"))),
    }
}

/// Converts a fixed-width ECDSA `r || s` signature into its DER form.
/// RSA signatures are returned unchanged.
fn raw_to_der_signature(raw: &[u8], algorithm: JwsAlgorithm) -> Result<Vec<u8>> {
    let Some(width) = algorithm.component_width() else {
        return Ok(raw.to_vec());
    };
    if raw.len() != width * 2 {
        return Err(FidelisError::parse(format!(
            "Invalid ECDSA signature length {}, expected {}",
            raw.len(),
            width * 2
        )));
    }

    let invalid =
        |e: p256::ecdsa::Error| FidelisError::parse(format!("Invalid {algorithm} signature: {e}"));
    match algorithm {
        JwsAlgorithm::Es256 => Ok(p256::ecdsa::Signature::from_slice(raw)
            .map_err(invalid)?
            .to_der()
            .as_bytes()
            .to_vec()),
        JwsAlgorithm::Es384 => Ok(p384::ecdsa::Signature::from_slice(raw)
            .map_err(invalid)?
            .to_der()
            .as_bytes()
            .to_vec()),
        _ => Err(FidelisError::unsupported(format!("{algorithm} signatures"))),
    }
}
