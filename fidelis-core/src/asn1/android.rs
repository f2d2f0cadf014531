//! Android Key Attestation extension (OID 1.3.6.1.4.1.11129.2.1.17).
//!
//! ```text
//! KeyDescription ::= SEQUENCE {
//!     attestationVersion, attestationSecurityLevel,
//!     keymasterVersion, keymasterSecurityLevel,
//!     attestationChallenge  OCTET STRING,     -- index 4
//!     uniqueId              OCTET STRING,
//!     softwareEnforced      AuthorizationList, -- index 6
//!     teeEnforced           AuthorizationList  -- index 7
//! }
//! ```

use x509_parser::der_parser::ber::{BerObject, BerObjectContent};

use super::{context_tag, explicit_inner, parse_single};
use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

pub const OID_ANDROID_KEY_ATTESTATION: &str = "1.3.6.1.4.1.11129.2.1.17";

const INDEX_CHALLENGE: usize = 4;
const INDEX_SOFTWARE_ENFORCED: usize = 6;
const INDEX_TEE_ENFORCED: usize = 7;

const TAG_PURPOSE: u32 = 1;
const TAG_ALL_APPLICATIONS: u32 = 600;
const TAG_ORIGIN: u32 = 702;

pub const KM_ORIGIN_GENERATED: i64 = 0;
pub const KM_PURPOSE_SIGN: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationList {
    pub purpose: Option<Vec<i64>>,
    pub all_applications: bool,
    pub origin: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidKeyDescription {
    pub attestation_challenge: ByteBuffer,
    pub software_enforced: AuthorizationList,
    pub tee_enforced: AuthorizationList,
}

impl AndroidKeyDescription {
    /// Parses the extension value. Structural errors are reported as parse errors.
    pub fn parse(extension_value: &ByteBuffer) -> Result<Self> {
        Self::parse_inner(extension_value)
            .map_err(|e| FidelisError::parse(format!("Invalid Android key description: {e}")))
    }

    fn parse_inner(extension_value: &ByteBuffer) -> Result<Self> {
        let object = parse_single(extension_value.as_slice())?;
        let fields = sequence(&object, "KeyDescription")?;
        if fields.len() <= INDEX_TEE_ENFORCED {
            return Err(FidelisError::parse(format!(
                "expected at least {} fields, found {}",
                INDEX_TEE_ENFORCED + 1,
                fields.len()
            )));
        }

        let attestation_challenge = match fields[INDEX_CHALLENGE].content {
            BerObjectContent::OctetString(challenge) => ByteBuffer::from(challenge),
            _ => return Err(FidelisError::parse("attestationChallenge is not an OCTET STRING")),
        };
        Ok(Self {
            attestation_challenge,
            software_enforced: parse_authorization_list(&fields[INDEX_SOFTWARE_ENFORCED])?,
            tee_enforced: parse_authorization_list(&fields[INDEX_TEE_ENFORCED])?,
        })
    }
}

fn sequence<'o, 'a>(object: &'o BerObject<'a>, what: &str) -> Result<&'o Vec<BerObject<'a>>> {
    object
        .as_sequence()
        .map_err(|e| FidelisError::parse(format!("{what} is not a SEQUENCE: {e}")))
}

fn integer(object: &BerObject, what: &str) -> Result<i64> {
    object
        .as_i64()
        .map_err(|e| FidelisError::parse(format!("{what} is not an INTEGER: {e}")))
}

fn parse_authorization_list(object: &BerObject) -> Result<AuthorizationList> {
    let mut list = AuthorizationList::default();

    for entry in sequence(object, "AuthorizationList")? {
        match context_tag(entry) {
            Some(TAG_PURPOSE) => {
                let inner = explicit_inner(entry)?;
                let purposes = inner
                    .as_set()
                    .map_err(|e| FidelisError::parse(format!("purpose is not a SET: {e}")))?
                    .iter()
                    .map(|p| integer(p, "purpose"))
                    .collect::<Result<Vec<_>>>()?;
                list.purpose = Some(purposes);
            }
            Some(TAG_ALL_APPLICATIONS) => {
                if !matches!(explicit_inner(entry)?.content, BerObjectContent::Null) {
                    return Err(FidelisError::parse("allApplications is not NULL"));
                }
                list.all_applications = true;
            }
            Some(TAG_ORIGIN) => {
                list.origin = Some(integer(&explicit_inner(entry)?, "origin")?);
            }
            _ => {}
        }
    }
    Ok(list)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn tlv(tag: &[u8], content: &[u8]) -> Vec<u8> {
        assert!(content.len() < 128, "test helper only emits short lengths");
        let mut out = tag.to_vec();
        out.push(content.len() as u8);
        out.extend_from_slice(content);
        out
    }

    /// Builds a KeyDescription with the given challenge and TEE-enforced
    /// purpose/origin, optionally marking allApplications in the software list.
    pub(crate) fn key_description(
        challenge: &[u8],
        purpose: i64,
        origin: i64,
        all_applications: bool,
    ) -> Vec<u8> {
        let integer = |v: i64| tlv(&[0x02], &[v as u8]);

        let mut software = Vec::new();
        if all_applications {
            software.extend(tlv(&[0xbf, 0x84, 0x58], &tlv(&[0x05], &[])));
        }
        let mut tee = Vec::new();
        tee.extend(tlv(&[0xa1], &tlv(&[0x31], &integer(purpose))));
        tee.extend(tlv(&[0xbf, 0x85, 0x3e], &integer(origin)));

        let mut body = Vec::new();
        body.extend(integer(3));
        body.extend(tlv(&[0x0a], &[1]));
        body.extend(integer(4));
        body.extend(tlv(&[0x0a], &[1]));
        body.extend(tlv(&[0x04], challenge));
        body.extend(tlv(&[0x04], &[]));
        body.extend(tlv(&[0x30], &software));
        body.extend(tlv(&[0x30], &tee));
        tlv(&[0x30], &body)
    }

    #[test]
    fn test_parse_key_description() {
        let der = key_description(&[0x42; 32], KM_PURPOSE_SIGN, KM_ORIGIN_GENERATED, false);
        let description = AndroidKeyDescription::parse(&ByteBuffer::new(der)).unwrap();
        assert_eq!(description.attestation_challenge.as_slice(), &[0x42; 32]);
        assert_eq!(description.tee_enforced.purpose, Some(vec![KM_PURPOSE_SIGN]));
        assert_eq!(description.tee_enforced.origin, Some(KM_ORIGIN_GENERATED));
        assert!(!description.tee_enforced.all_applications);
        assert_eq!(description.software_enforced, AuthorizationList::default());
    }

    #[test]
    fn test_all_applications_presence() {
        let der = key_description(&[0x01; 32], KM_PURPOSE_SIGN, KM_ORIGIN_GENERATED, true);
        let description = AndroidKeyDescription::parse(&ByteBuffer::new(der)).unwrap();
        assert!(description.software_enforced.all_applications);
    }

    #[test]
    fn test_structural_errors_are_parse_errors() {
        let err = AndroidKeyDescription::parse(&ByteBuffer::from_hex("3003020101").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
        assert!(err.to_string().contains("Android key description"));

        let err = AndroidKeyDescription::parse(&ByteBuffer::from_hex("04021234").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }
}
