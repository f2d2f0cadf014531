//! The signed metadata table of contents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::models::{identifier_matches, MetadataStatement, StatusReport};
use crate::error::{FidelisError, Result};
use crate::jwt::{Jwt, JwtValidator, ValidationContext};
use crate::pki::{TrustAnchor, TrustPath, TrustPathValidator, X509Certificate};
use crate::registration::MetadataIdentifier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataToc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_header: Option<String>,
    pub no: u64,
    /// `YYYY-MM-DD`.
    pub next_update: String,
    pub entries: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_certificate_key_identifiers: Vec<String>,
    /// Base64url SHA-256 of the downloadable statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub status_reports: Vec<StatusReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_last_status_change: Option<String>,
    /// Statement carried inline by MDS3 style tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_statement: Option<MetadataStatement>,
}

impl TocEntry {
    pub fn matches(&self, identifier: &MetadataIdentifier) -> bool {
        identifier_matches(
            identifier,
            self.aaguid.as_deref(),
            self.aaid.as_deref(),
            &self.attestation_certificate_key_identifiers,
        )
    }
}

impl MetadataToc {
    /// Verifies `token` as a JWS whose `x5c` chain leads to `root`, and reads
    /// its body.
    pub fn verify(
        token: &str,
        root: &X509Certificate,
        trust_path_validator: &TrustPathValidator,
    ) -> Result<Self> {
        let jwt = Jwt::parse(token.trim())?;
        let x5c = JwtValidator::new().validate_x5c(&jwt, &ValidationContext::default())?;

        let path = TrustPath::CertificateChain(x5c.certificates);
        if !trust_path_validator.validate(&path, &TrustAnchor::Certificate(root.clone())) {
            return Err(FidelisError::verification(
                "TOC certificate chain is not trusted",
            ));
        }

        let toc = Self::from_jwt(&jwt)?;
        debug!(no = toc.no, entries = toc.entries.len(), next_update = %toc.next_update, "TOC verified");
        Ok(toc)
    }

    /// Reads the body without checking the signature.
    pub fn from_jwt(jwt: &Jwt) -> Result<Self> {
        let toc: Self = serde_json::from_value(Value::Object(jwt.body().clone()))
            .map_err(|e| FidelisError::parse(format!("Invalid metadata TOC: {e}")))?;
        toc.next_update_time()?;
        Ok(toc)
    }

    /// Start of the `nextUpdate` day in UTC.
    pub fn next_update_time(&self) -> Result<DateTime<Utc>> {
        NaiveDate::parse_from_str(&self.next_update, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|time| time.and_utc())
            .ok_or_else(|| {
                FidelisError::parse(format!(
                    "Invalid TOC nextUpdate '{}', expected YYYY-MM-DD",
                    self.next_update
                ))
            })
    }

    pub fn find(&self, identifier: &MetadataIdentifier) -> Option<&TocEntry> {
        self.entries.iter().find(|entry| entry.matches(identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aaguid::Aaguid;
    use chrono::TimeZone;

    fn toc(next_update: &str) -> MetadataToc {
        serde_json::from_value(serde_json::json!({
            "no": 7,
            "nextUpdate": next_update,
            "entries": [
                {"aaguid": "00112233-4455-6677-8899-aabbccddeeff", "url": "https://mds.example/a", "hash": "AAAA"},
                {"attestationCertificateKeyIdentifiers": ["0102"], "statusReports": [{"status": "REVOKED"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_next_update_time() {
        assert_eq!(
            toc("2026-03-01").next_update_time().unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
        let err = toc("01/03/2026").next_update_time().unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"), "got: {err}");
    }

    #[test]
    fn test_find_entry() {
        let toc = toc("2026-03-01");
        let aaguid = Aaguid::parse_string("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let entry = toc.find(&MetadataIdentifier::Aaguid(aaguid)).unwrap();
        assert_eq!(entry.url.as_deref(), Some("https://mds.example/a"));

        let entry = toc
            .find(&MetadataIdentifier::AttestationKeyId("0102".into()))
            .unwrap();
        assert_eq!(entry.status_reports.len(), 1);
        assert!(toc.find(&MetadataIdentifier::Aaid("x#y".into())).is_none());
    }
}
