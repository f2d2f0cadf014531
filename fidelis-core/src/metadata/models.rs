//! Metadata statement and status report models.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::aaguid::Aaguid;
use crate::attestation::AttestationType;
use crate::error::{FidelisError, Result};
use crate::pki::{TrustAnchor, TrustAnchorSet, X509Certificate};
use crate::registration::MetadataIdentifier;

/// A FIDO metadata statement describing one authenticator model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aaguid: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attestation_certificate_key_identifiers: Vec<String>,
    pub description: String,
    #[serde(default)]
    pub authenticator_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_family: Option<String>,
    #[serde(default, with = "attestation_type_list")]
    pub attestation_types: Vec<AttestationType>,
    /// Base64 DER root certificates.
    #[serde(default)]
    pub attestation_root_certificates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl MetadataStatement {
    pub fn matches(&self, identifier: &MetadataIdentifier) -> bool {
        identifier_matches(
            identifier,
            self.aaguid.as_deref(),
            self.aaid.as_deref(),
            &self.attestation_certificate_key_identifiers,
        )
    }

    pub fn root_certificates(&self) -> Result<Vec<X509Certificate>> {
        self.attestation_root_certificates
            .iter()
            .map(|encoded| X509Certificate::from_base64(encoded))
            .collect()
    }
}

pub(crate) fn identifier_matches(
    identifier: &MetadataIdentifier,
    aaguid: Option<&str>,
    aaid: Option<&str>,
    key_identifiers: &[String],
) -> bool {
    match identifier {
        MetadataIdentifier::Aaguid(expected) => aaguid
            .and_then(|value| Aaguid::parse_string(value).ok())
            .is_some_and(|value| &value == expected),
        MetadataIdentifier::Aaid(expected) => aaid == Some(expected.as_str()),
        MetadataIdentifier::AttestationKeyId(expected) => key_identifiers
            .iter()
            .any(|key_id| key_id.eq_ignore_ascii_case(expected)),
    }
}

/// Certification and compromise status published for an authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticatorStatus {
    NotFidoCertified,
    FidoCertified,
    UserVerificationBypass,
    AttestationKeyCompromise,
    UserKeyRemoteCompromise,
    UserKeyPhysicalCompromise,
    UpdateAvailable,
    Revoked,
    SelfAssertionSubmitted,
    #[serde(rename = "FIDO_CERTIFIED_L1")]
    FidoCertifiedL1,
    #[serde(rename = "FIDO_CERTIFIED_L1plus")]
    FidoCertifiedL1Plus,
    #[serde(rename = "FIDO_CERTIFIED_L2")]
    FidoCertifiedL2,
    #[serde(rename = "FIDO_CERTIFIED_L2plus")]
    FidoCertifiedL2Plus,
    #[serde(rename = "FIDO_CERTIFIED_L3")]
    FidoCertifiedL3,
    #[serde(rename = "FIDO_CERTIFIED_L3plus")]
    FidoCertifiedL3Plus,
    #[serde(other)]
    Unknown,
}

impl AuthenticatorStatus {
    /// Statuses that mean the authenticator must not be trusted.
    pub fn is_undesired(self) -> bool {
        matches!(
            self,
            AuthenticatorStatus::Revoked
                | AuthenticatorStatus::UserVerificationBypass
                | AuthenticatorStatus::AttestationKeyCompromise
                | AuthenticatorStatus::UserKeyRemoteCompromise
                | AuthenticatorStatus::UserKeyPhysicalCompromise
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthenticatorStatus::NotFidoCertified => "NOT_FIDO_CERTIFIED",
            AuthenticatorStatus::FidoCertified => "FIDO_CERTIFIED",
            AuthenticatorStatus::UserVerificationBypass => "USER_VERIFICATION_BYPASS",
            AuthenticatorStatus::AttestationKeyCompromise => "ATTESTATION_KEY_COMPROMISE",
            AuthenticatorStatus::UserKeyRemoteCompromise => "USER_KEY_REMOTE_COMPROMISE",
            AuthenticatorStatus::UserKeyPhysicalCompromise => "USER_KEY_PHYSICAL_COMPROMISE",
            AuthenticatorStatus::UpdateAvailable => "UPDATE_AVAILABLE",
            AuthenticatorStatus::Revoked => "REVOKED",
            AuthenticatorStatus::SelfAssertionSubmitted => "SELF_ASSERTION_SUBMITTED",
            AuthenticatorStatus::FidoCertifiedL1 => "FIDO_CERTIFIED_L1",
            AuthenticatorStatus::FidoCertifiedL1Plus => "FIDO_CERTIFIED_L1plus",
            AuthenticatorStatus::FidoCertifiedL2 => "FIDO_CERTIFIED_L2",
            AuthenticatorStatus::FidoCertifiedL2Plus => "FIDO_CERTIFIED_L2plus",
            AuthenticatorStatus::FidoCertifiedL3 => "FIDO_CERTIFIED_L3",
            AuthenticatorStatus::FidoCertifiedL3Plus => "FIDO_CERTIFIED_L3plus",
            AuthenticatorStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for AuthenticatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: AuthenticatorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certification_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_number: Option<String>,
}

impl StatusReport {
    pub fn new(status: AuthenticatorStatus) -> Self {
        Self {
            status,
            effective_date: None,
            certificate: None,
            url: None,
            certification_descriptor: None,
            certificate_number: None,
        }
    }
}

/// Trust metadata resolved for one authenticator.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub description: String,
    pub attestation_types: Vec<AttestationType>,
    pub status_reports: Vec<StatusReport>,
    pub trust_anchors: TrustAnchorSet,
    pub statement: MetadataStatement,
}

impl Metadata {
    /// Builds metadata from a statement. Its root certificates become the
    /// certificate trust anchors.
    pub fn from_statement(
        statement: MetadataStatement,
        status_reports: Vec<StatusReport>,
    ) -> Result<Self> {
        let trust_anchors = statement
            .root_certificates()
            .map_err(|e| {
                FidelisError::parse(format!(
                    "Invalid root certificate in metadata for '{}': {e}",
                    statement.description
                ))
            })?
            .into_iter()
            .map(TrustAnchor::Certificate)
            .collect();

        Ok(Self {
            description: statement.description.clone(),
            attestation_types: statement.attestation_types.clone(),
            status_reports,
            trust_anchors,
            statement,
        })
    }

    pub fn supports_attestation_type(&self, attestation_type: AttestationType) -> bool {
        self.attestation_types.contains(&attestation_type)
    }

    pub fn undesired_status(&self) -> Option<&StatusReport> {
        self.status_reports
            .iter()
            .find(|report| report.status.is_undesired())
    }
}

/// Attestation types appear as numeric tags in UAF style statements and as
/// names in FIDO2 statements. Both are accepted; names are written.
mod attestation_type_list {
    use super::*;

    const TAG_BASIC_FULL: u16 = 0x3E07;
    const TAG_BASIC_SURROGATE: u16 = 0x3E08;
    const TAG_ECDAA: u16 = 0x3E09;
    const TAG_ATTCA: u16 = 0x3E0A;
    const TAG_NONE: u16 = 0x3E0B;
    const TAG_ANONCA: u16 = 0x3E0C;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Tag(u16),
        Name(String),
    }

    fn from_tag(tag: u16) -> Option<AttestationType> {
        Some(match tag {
            TAG_BASIC_FULL => AttestationType::Basic,
            TAG_BASIC_SURROGATE => AttestationType::SelfAttestation,
            TAG_ECDAA => AttestationType::Ecdaa,
            TAG_ATTCA => AttestationType::AttCa,
            TAG_NONE => AttestationType::None,
            TAG_ANONCA => AttestationType::AnonCa,
            _ => return None,
        })
    }

    fn from_name(name: &str) -> Option<AttestationType> {
        Some(match name {
            "basic_full" => AttestationType::Basic,
            "basic_surrogate" => AttestationType::SelfAttestation,
            "ecdaa" => AttestationType::Ecdaa,
            "attca" => AttestationType::AttCa,
            "none" => AttestationType::None,
            "anonca" => AttestationType::AnonCa,
            _ => return None,
        })
    }

    fn name(attestation_type: &AttestationType) -> &'static str {
        match attestation_type {
            AttestationType::Basic => "basic_full",
            AttestationType::SelfAttestation => "basic_surrogate",
            AttestationType::Ecdaa => "ecdaa",
            AttestationType::AttCa => "attca",
            AttestationType::None => "none",
            AttestationType::AnonCa => "anonca",
        }
    }

    pub fn serialize<S: Serializer>(
        types: &[AttestationType],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(types.iter().map(name))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<AttestationType>, D::Error> {
        Vec::<Raw>::deserialize(deserializer)?
            .into_iter()
            .map(|raw| match raw {
                Raw::Tag(tag) => from_tag(tag).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown attestation type tag 0x{tag:04X}"))
                }),
                Raw::Name(name) => from_name(&name).ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown attestation type '{name}'"))
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestCa;

    #[test]
    fn test_statement_accepts_tags_and_names() {
        let statement: MetadataStatement = serde_json::from_str(
            r#"{
                "description": "Test Key",
                "aaguid": "00112233-4455-6677-8899-aabbccddeeff",
                "attestationTypes": [15879, "attca", 15883],
                "attestationRootCertificates": []
            }"#,
        )
        .unwrap();
        assert_eq!(
            statement.attestation_types,
            vec![AttestationType::Basic, AttestationType::AttCa, AttestationType::None]
        );

        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["attestationTypes"][0], "basic_full");

        let err = serde_json::from_str::<MetadataStatement>(
            r#"{"description": "x", "attestationTypes": [1]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("0x0001"), "got: {err}");
    }

    #[test]
    fn test_statement_matches_identifiers() {
        let statement = MetadataStatement {
            legal_header: None,
            aaid: Some("4e4e#4005".into()),
            aaguid: Some("00112233-4455-6677-8899-AABBCCDDEEFF".into()),
            attestation_certificate_key_identifiers: vec!["ABCDEF".into()],
            description: "Test".into(),
            authenticator_version: 1,
            protocol_family: None,
            attestation_types: vec![],
            attestation_root_certificates: vec![],
            icon: None,
        };
        let aaguid = Aaguid::parse_string("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        assert!(statement.matches(&MetadataIdentifier::Aaguid(aaguid)));
        assert!(!statement.matches(&MetadataIdentifier::Aaguid(Aaguid::zero())));
        assert!(statement.matches(&MetadataIdentifier::Aaid("4e4e#4005".into())));
        assert!(statement.matches(&MetadataIdentifier::AttestationKeyId("abcdef".into())));
        assert!(!statement.matches(&MetadataIdentifier::AttestationKeyId("abcd".into())));
    }

    #[test]
    fn test_status_serde() {
        let report: StatusReport =
            serde_json::from_str(r#"{"status": "FIDO_CERTIFIED_L1plus"}"#).unwrap();
        assert_eq!(report.status, AuthenticatorStatus::FidoCertifiedL1Plus);
        let report: StatusReport =
            serde_json::from_str(r#"{"status": "SOMETHING_NEW", "url": "x"}"#).unwrap();
        assert_eq!(report.status, AuthenticatorStatus::Unknown);

        assert!(AuthenticatorStatus::Revoked.is_undesired());
        assert!(AuthenticatorStatus::AttestationKeyCompromise.is_undesired());
        assert!(!AuthenticatorStatus::UpdateAvailable.is_undesired());
        assert!(!AuthenticatorStatus::FidoCertified.is_undesired());
    }

    #[test]
    fn test_metadata_anchors_from_roots() {
        let root = TestCa::root("Metadata Root", 1);
        let statement: MetadataStatement = serde_json::from_value(serde_json::json!({
            "description": "With root",
            "attestationTypes": ["basic_full"],
            "attestationRootCertificates": [root.cert.der().to_base64()],
        }))
        .unwrap();

        let metadata =
            Metadata::from_statement(statement, vec![StatusReport::new(AuthenticatorStatus::Revoked)])
                .unwrap();
        assert_eq!(metadata.trust_anchors.anchors(), &[TrustAnchor::Certificate(root.cert.clone())]);
        assert!(metadata.supports_attestation_type(AttestationType::Basic));
        assert!(metadata.undesired_status().is_some());

        let broken: MetadataStatement = serde_json::from_value(serde_json::json!({
            "description": "Broken",
            "attestationRootCertificates": ["AAAA"],
        }))
        .unwrap();
        assert!(Metadata::from_statement(broken, vec![]).is_err());
    }
}
