//! DER parsing of vendor certificate extensions.

mod android;

pub use android::{
    AndroidKeyDescription, AuthorizationList, KM_ORIGIN_GENERATED, KM_PURPOSE_SIGN,
    OID_ANDROID_KEY_ATTESTATION,
};

#[cfg(test)]
pub(crate) use android::tests::key_description;

use x509_parser::der_parser::ber::{BerObject, BerObjectContent};
use x509_parser::der_parser::der::parse_der;

use crate::aaguid::Aaguid;
use crate::buffer::ByteBuffer;
use crate::error::{FidelisError, Result};

/// id-fido-gen-ce-aaguid
pub const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";
/// Apple anonymous attestation nonce
pub const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";
/// tcg-kp-AIKCertificate
pub const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";

/// Parses one DER element that must span the whole input.
pub(crate) fn parse_single(bytes: &[u8]) -> Result<BerObject<'_>> {
    let (rest, object) =
        parse_der(bytes).map_err(|e| FidelisError::parse(format!("Malformed DER: {e}")))?;
    if !rest.is_empty() {
        return Err(FidelisError::parse("Unexpected data after DER element"));
    }
    Ok(object)
}

/// Tag number of a context-specific element, `None` for any other class.
pub(crate) fn context_tag(object: &BerObject) -> Option<u32> {
    object
        .is_contextspecific()
        .then(|| object.header.tag().0)
}

/// The single element wrapped by an EXPLICIT context-specific tag.
pub(crate) fn explicit_inner<'a>(object: &BerObject<'a>) -> Result<BerObject<'a>> {
    let content = object
        .as_slice()
        .map_err(|e| FidelisError::parse(format!("Expected a tagged element: {e}")))?;
    parse_single(content)
}

/// The AAGUID carried by the FIDO extension, an OCTET STRING of 16 bytes.
pub fn parse_aaguid_extension(value: &ByteBuffer) -> Result<Aaguid> {
    let object = parse_single(value.as_slice())
        .map_err(|e| FidelisError::parse(format!("Invalid AAGUID extension: {e}")))?;
    match object.content {
        BerObjectContent::OctetString(bytes) => Aaguid::from_bytes(bytes),
        _ => Err(FidelisError::parse(
            "Invalid AAGUID extension: expected OCTET STRING",
        )),
    }
}

/// The nonce of Apple's extension: `SEQUENCE { [1] EXPLICIT OCTET STRING }`.
pub fn parse_apple_nonce(value: &ByteBuffer) -> Result<ByteBuffer> {
    let inner = || -> Result<ByteBuffer> {
        let object = parse_single(value.as_slice())?;
        let fields = object
            .as_sequence()
            .map_err(|e| FidelisError::parse(format!("expected SEQUENCE: {e}")))?;
        let tagged = fields
            .iter()
            .find(|field| context_tag(field) == Some(1))
            .ok_or_else(|| FidelisError::parse("missing [1] nonce"))?;
        match explicit_inner(tagged)?.content {
            BerObjectContent::OctetString(nonce) => Ok(ByteBuffer::from(nonce)),
            _ => Err(FidelisError::parse("[1] nonce is not an OCTET STRING")),
        }
    };
    inner().map_err(|e| FidelisError::parse(format!("Invalid Apple nonce extension: {e}")))
}
