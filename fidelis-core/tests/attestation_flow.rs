//! End-to-end registration tests: attestation objects built from rcgen
//! certificates and p256 keys, verified through the default format registry.

mod common;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use common::*;
use fidelis_core::cbor::{CborMap, CborValue};
use fidelis_core::{
    verify_registration, Aaguid, AttestationFormatRegistry, AttestationType, ByteBuffer,
    MetadataIdentifier, TrustPath,
};
use rcgen::CustomExtension;
use sha2::{Digest, Sha256};

fn registry() -> AttestationFormatRegistry {
    AttestationFormatRegistry::with_default_formats()
}

#[test]
fn test_none_registration() {
    let object = attestation_object("none", CborMap::new(), auth_data(&[0; 16], 1, 0));
    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();

    assert_eq!(result.attestation_type, AttestationType::None);
    assert_eq!(result.trust_path, TrustPath::Empty);
    assert_eq!(result.credential_id.as_slice(), &CREDENTIAL_ID);
    assert_eq!(result.identifier().unwrap(), None, "zero AAGUID, no certificates");
}

#[test]
fn test_fido_u2f_registration() {
    let root = TestCa::root("U2F Root", 10);
    let leaf = root.issue(params("U2F Device"), 11);
    let data = auth_data(&[0; 16], 1, 0);

    let mut message = vec![0x00];
    message.extend_from_slice(&rp_id_hash());
    message.extend_from_slice(&CLIENT_DATA_HASH);
    message.extend_from_slice(&CREDENTIAL_ID);
    message.extend(cose_key(1).uncompressed_point().unwrap());

    let statement = CborMap::new()
        .with(CborValue::text("sig"), CborValue::bytes(sign_der(11, &message)))
        .unwrap()
        .with(CborValue::text("x5c"), x5c(&[&leaf]))
        .unwrap();
    let object = attestation_object("fido-u2f", statement, data);

    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.format, "fido-u2f");
    assert_eq!(result.attestation_type, AttestationType::Basic);
    assert_eq!(result.trust_path, TrustPath::CertificateChain(vec![leaf.clone()]));
    assert_eq!(
        result.identifier().unwrap(),
        Some(MetadataIdentifier::AttestationKeyId(
            leaf.public_key_identifier().unwrap()
        ))
    );

    let err = verify_registration(&registry(), &object, &[0u8; 32]).unwrap_err();
    assert!(err.is_verification_failure(), "other client data must fail: {err}");
}

#[test]
fn test_packed_basic_registration() {
    let root = TestCa::root("Packed Root", 20);
    let object = packed_basic(&root, 21);

    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::Basic);
    assert_eq!(result.trust_path.certificates().len(), 1);
    assert_eq!(result.public_key, cose_key(1));
    assert_eq!(
        result.identifier().unwrap(),
        Some(MetadataIdentifier::Aaguid(Aaguid::from_bytes(&AAGUID).unwrap()))
    );
}

#[test]
fn test_packed_aaguid_extension_must_match() {
    let root = TestCa::root("Packed Root", 20);
    let leaf = root.issue(packed_params(&[0x55; 16]), 21);
    let data = auth_data(&AAGUID, 1, 0);
    let statement = CborMap::new()
        .with(CborValue::text("alg"), CborValue::from_int(-7))
        .unwrap()
        .with(
            CborValue::text("sig"),
            CborValue::bytes(sign_der(21, &signed_message(&data))),
        )
        .unwrap()
        .with(CborValue::text("x5c"), x5c(&[&leaf]))
        .unwrap();
    let object = attestation_object("packed", statement, data);

    let err = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap_err();
    assert!(err.to_string().contains("does not match"), "got: {err}");
}

#[test]
fn test_packed_self_registration() {
    let data = auth_data(&AAGUID, 4, 9);
    let statement = CborMap::new()
        .with(CborValue::text("alg"), CborValue::from_int(-7))
        .unwrap()
        .with(
            CborValue::text("sig"),
            CborValue::bytes(sign_der(4, &signed_message(&data))),
        )
        .unwrap();
    let object = attestation_object("packed", statement, data);

    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::SelfAttestation);
    assert_eq!(result.trust_path, TrustPath::Empty);
    assert_eq!(result.sign_count, 9);
}

fn android_key_description(challenge: &[u8]) -> Vec<u8> {
    fn tlv(tag: &[u8], content: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.push(content.len() as u8);
        out.extend_from_slice(content);
        out
    }
    let integer = |v: u8| tlv(&[0x02], &[v]);

    // TEE list: purpose [1] SET { SIGN }, origin [702] GENERATED.
    let mut tee = tlv(&[0xa1], &tlv(&[0x31], &integer(2)));
    tee.extend(tlv(&[0xbf, 0x85, 0x3e], &integer(0)));

    let mut body = Vec::new();
    body.extend(integer(3));
    body.extend(tlv(&[0x0a], &[1]));
    body.extend(integer(4));
    body.extend(tlv(&[0x0a], &[1]));
    body.extend(tlv(&[0x04], challenge));
    body.extend(tlv(&[0x04], &[]));
    body.extend(tlv(&[0x30], &[]));
    body.extend(tlv(&[0x30], &tee));
    tlv(&[0x30], &body)
}

#[test]
fn test_android_key_registration() {
    let root = TestCa::root("Android Root", 30);
    let mut leaf_params = params("Android Keystore Key");
    leaf_params.custom_extensions.push(CustomExtension::from_oid_content(
        &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17],
        android_key_description(&CLIENT_DATA_HASH),
    ));
    // The attested key is the credential key itself.
    let leaf = root.issue(leaf_params, 2);
    let data = auth_data(&[0; 16], 2, 0);

    let statement = CborMap::new()
        .with(CborValue::text("alg"), CborValue::from_int(-7))
        .unwrap()
        .with(
            CborValue::text("sig"),
            CborValue::bytes(sign_der(2, &signed_message(&data))),
        )
        .unwrap()
        .with(CborValue::text("x5c"), x5c(&[&leaf, &root.cert]))
        .unwrap();
    let object = attestation_object("android-key", statement, data);

    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::Basic);
    assert_eq!(result.trust_path.certificates().len(), 2);

    let err = verify_registration(&registry(), &object, &[0x01; 32]).unwrap_err();
    assert!(err.is_verification_failure(), "got: {err}");
}

fn safetynet_object(cts_profile_match: bool) -> (fidelis_core::AttestationObject, Vec<u8>) {
    let root = TestCa::root("SafetyNet Root", 40);
    let leaf = root.issue(params("attest.android.com"), 41);
    let data = auth_data(&[0; 16], 1, 0);

    let header = serde_json::json!({
        "alg": "ES256",
        "x5c": [leaf.der().to_base64()],
    });
    let body = serde_json::json!({
        "nonce": STANDARD.encode(Sha256::digest(signed_message(&data))),
        "ctsProfileMatch": cts_profile_match,
        "timestampMs": Utc::now().timestamp_millis(),
        "apkPackageName": "com.google.android.gms",
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(body.to_string())
    );
    let jws = format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(sign_raw(41, signing_input.as_bytes()))
    );

    let statement = CborMap::new()
        .with(CborValue::text("ver"), CborValue::text("14366018"))
        .unwrap()
        .with(CborValue::text("response"), CborValue::bytes(jws.into_bytes()))
        .unwrap();
    (
        attestation_object("android-safetynet", statement, data),
        leaf.der().as_slice().to_vec(),
    )
}

#[test]
fn test_android_safetynet_registration() {
    let (object, leaf_der) = safetynet_object(true);
    let result = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap();
    assert_eq!(result.attestation_type, AttestationType::Basic);
    assert_eq!(
        result.trust_path.leaf().unwrap().der(),
        &ByteBuffer::new(leaf_der)
    );

    let (object, _) = safetynet_object(false);
    let err = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap_err();
    assert!(err.to_string().contains("ctsProfileMatch"), "got: {err}");
}

#[test]
fn test_unknown_format_is_rejected() {
    let object = attestation_object("vendor-x", CborMap::new(), auth_data(&[0; 16], 1, 0));
    let err = verify_registration(&registry(), &object, &CLIENT_DATA_HASH).unwrap_err();
    assert_eq!(err.kind(), fidelis_core::ErrorKind::FormatNotSupported);
}
