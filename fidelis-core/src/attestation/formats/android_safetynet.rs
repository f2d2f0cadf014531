use std::any::Any;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::signed_data;
use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::cbor::CborMap;
use crate::error::{FidelisError, Result};
use crate::jwt::{Jwt, JwtValidator, ValidationContext};
use crate::pki::TrustPath;

const FORMAT_ID: &str = "android-safetynet";
const ATTEST_HOSTNAME: &str = "attest.android.com";

/// The claims of a SafetyNet attestation response this crate checks.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyNetResponse {
    pub nonce: String,
    pub cts_profile_match: bool,
    pub timestamp_ms: i64,
}

impl SafetyNetResponse {
    pub fn from_jwt(jwt: &Jwt) -> Result<Self> {
        let body = jwt.body();

        let nonce = match body.get("nonce") {
            Some(Value::String(nonce)) => nonce.clone(),
            Some(_) => return Err(FidelisError::parse("SafetyNet 'nonce' must be a string")),
            None => return Err(FidelisError::parse("SafetyNet response is missing 'nonce'")),
        };
        let cts_profile_match = match body.get("ctsProfileMatch") {
            Some(Value::Bool(value)) => *value,
            Some(_) => {
                return Err(FidelisError::parse(
                    "SafetyNet 'ctsProfileMatch' must be a boolean",
                ))
            }
            None => {
                return Err(FidelisError::parse(
                    "SafetyNet response is missing 'ctsProfileMatch'",
                ))
            }
        };
        let timestamp_ms = match body.get("timestampMs") {
            Some(Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|f| f as i64))
                .ok_or_else(|| FidelisError::parse("SafetyNet 'timestampMs' is out of range"))?,
            Some(_) => return Err(FidelisError::parse("SafetyNet 'timestampMs' must be a number")),
            None => return Err(FidelisError::parse("SafetyNet response is missing 'timestampMs'")),
        };

        Ok(Self {
            nonce,
            cts_profile_match,
            timestamp_ms,
        })
    }
}

/// Android SafetyNet attestation.
#[derive(Debug, Clone, Copy)]
pub struct AndroidSafetyNetFormat {
    pub max_age: Duration,
    pub max_clock_skew: Duration,
    /// Fixed "now" for the timestamp check; the current time when unset.
    pub verification_time: Option<DateTime<Utc>>,
}

impl Default for AndroidSafetyNetFormat {
    fn default() -> Self {
        Self {
            max_age: Duration::days(1),
            max_clock_skew: Duration::seconds(60),
            verification_time: None,
        }
    }
}

impl AndroidSafetyNetFormat {
    pub fn at(verification_time: DateTime<Utc>) -> Self {
        Self {
            verification_time: Some(verification_time),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyNetStatement {
    pub version: String,
    pub jwt: Jwt,
    pub response: SafetyNetResponse,
}

impl AttestationStatement for SafetyNetStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for AndroidSafetyNetFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        let version = statement.require_text("ver")?;
        if version.is_empty() {
            return Err(FidelisError::parse("Field 'ver' must not be empty"));
        }
        let response = statement.require_bytes("response")?;
        let token = std::str::from_utf8(response.as_slice())
            .map_err(|_| FidelisError::parse("SafetyNet response is not UTF-8"))?;
        let jwt = Jwt::parse(token)?;

        Ok(Box::new(SafetyNetStatement {
            version: version.to_string(),
            response: SafetyNetResponse::from_jwt(&jwt)?,
            jwt,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for AndroidSafetyNetFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<SafetyNetStatement>(statement, FORMAT_ID)?;
        let x5c = JwtValidator::new().validate_x5c(&statement.jwt, &ValidationContext::default())?;

        let expected_nonce =
            STANDARD.encode(Sha256::digest(signed_data(auth_data, client_data_hash)));
        if statement.response.nonce != expected_nonce {
            return Err(FidelisError::verification("SafetyNet nonce does not match"));
        }

        let common_name = x5c.leaf().subject()?.common_name;
        if common_name.as_deref() != Some(ATTEST_HOSTNAME) {
            return Err(FidelisError::verification(format!(
                "SafetyNet certificate must be issued to {ATTEST_HOSTNAME}, found {}",
                common_name.as_deref().unwrap_or("<none>")
            )));
        }
        if !statement.response.cts_profile_match {
            return Err(FidelisError::verification(
                "SafetyNet ctsProfileMatch is false",
            ));
        }
        self.check_timestamp(statement.response.timestamp_ms)?;
        debug!(version = %statement.version, "android-safetynet attestation verified");

        Ok(VerificationResult::new(
            AttestationType::Basic,
            TrustPath::CertificateChain(x5c.certificates),
        ))
    }
}

impl AndroidSafetyNetFormat {
    fn check_timestamp(&self, timestamp_ms: i64) -> Result<()> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| FidelisError::parse("SafetyNet 'timestampMs' is out of range"))?;
        let now = self.verification_time.unwrap_or_else(Utc::now);
        if timestamp > now + self.max_clock_skew {
            return Err(FidelisError::verification(
                "SafetyNet response timestamp is in the future",
            ));
        }
        if timestamp < now - self.max_age {
            return Err(FidelisError::verification("SafetyNet response is too old"));
        }
        Ok(())
    }
}
