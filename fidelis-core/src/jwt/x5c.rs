use serde_json::Value;

use super::token::Jwt;
use super::validator::JwsAlgorithm;
use crate::cose::CoseKey;
use crate::error::{FidelisError, Result};
use crate::pki::X509Certificate;

/// Certificates from an `x5c` header, leaf first, and the leaf key.
#[derive(Debug, Clone, PartialEq)]
pub struct X5cParameter {
    pub certificates: Vec<X509Certificate>,
    pub cose_key: CoseKey,
}

impl X5cParameter {
    pub fn leaf(&self) -> &X509Certificate {
        &self.certificates[0]
    }
}

pub struct X5cParameterReader;

impl X5cParameterReader {
    /// Returns `None` when the header has no `x5c` or an empty one.
    pub fn read(jwt: &Jwt) -> Result<Option<X5cParameter>> {
        let entries = match jwt.header().get("x5c") {
            None => return Ok(None),
            Some(Value::Array(entries)) if entries.is_empty() => return Ok(None),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(FidelisError::parse("JWT header 'x5c' must be an array")),
        };

        let certificates = entries
            .iter()
            .map(|entry| {
                let encoded = entry
                    .as_str()
                    .ok_or_else(|| FidelisError::parse("x5c entries must be strings"))?;
                X509Certificate::from_base64(encoded)
            })
            .collect::<Result<Vec<_>>>()?;

        let algorithm = JwsAlgorithm::from_name(jwt.algorithm()?)?;
        let cose_key = certificates[0].public_key(algorithm.cose_algorithm())?;

        Ok(Some(X5cParameter {
            certificates,
            cose_key,
        }))
    }
}
