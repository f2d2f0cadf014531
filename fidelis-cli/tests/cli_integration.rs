//! Integration tests for the fidelis CLI.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use fidelis_core::cbor::{self, CborMap, CborValue};
use fidelis_core::cose::{CoseAlgorithm, CoseCurve};
use fidelis_core::{ByteBuffer, CoseKey};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use predicates::prelude::*;
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use serde_json::json;
use tempfile::TempDir;

const AAGUID: &str = "cb69481e-8ff7-4039-93ec-0a2729a154a8";
const FIDELIS_VARS: [&str; 8] = [
    "FIDELIS_MDS_URL",
    "FIDELIS_MDS_TOKEN",
    "FIDELIS_MDS_ROOT_CERT",
    "FIDELIS_METADATA_PATHS",
    "FIDELIS_CACHE_DIR",
    "FIDELIS_ALLOW_NONE_ATTESTATION",
    "FIDELIS_ALLOW_SELF_ATTESTATION",
    "FIDELIS_HTTP_TIMEOUT_SECS",
];

fn fidelis() -> Command {
    let mut cmd = Command::cargo_bin("fidelis").unwrap();
    for var in FIDELIS_VARS {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn signing_key(seed: u8) -> SigningKey {
    let mut bytes = [seed; 32];
    bytes[0] = 0x02;
    SigningKey::from_slice(&bytes).unwrap()
}

fn key_pair(seed: u8) -> KeyPair {
    let der = signing_key(seed).to_pkcs8_der().unwrap();
    KeyPair::try_from(der.as_bytes()).unwrap()
}

fn params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
}

/// A `none` attestation object with a P-256 credential and sign count 5.
fn none_attestation_object() -> Vec<u8> {
    let point = signing_key(1).verifying_key().to_encoded_point(false);
    let key = CoseKey::ec2(
        CoseAlgorithm::Es256,
        CoseCurve::P256,
        ByteBuffer::new(point.x().unwrap().to_vec()),
        ByteBuffer::new(point.y().unwrap().to_vec()),
    )
    .unwrap();

    let mut auth_data = vec![0x11; 32];
    auth_data.push(0x45); // UP | UV | AT
    auth_data.extend_from_slice(&5u32.to_be_bytes());
    auth_data.extend_from_slice(&uuid_bytes(AAGUID));
    auth_data.extend_from_slice(&4u16.to_be_bytes());
    auth_data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    auth_data.extend(key.encode().unwrap());

    let map = CborMap::new()
        .with(CborValue::text("fmt"), CborValue::text("none"))
        .unwrap()
        .with(CborValue::text("attStmt"), CborValue::Map(CborMap::new()))
        .unwrap()
        .with(CborValue::text("authData"), CborValue::bytes(auth_data))
        .unwrap();
    cbor::encode(&CborValue::Map(map)).unwrap()
}

fn uuid_bytes(value: &str) -> Vec<u8> {
    let hex: String = value.chars().filter(|c| *c != '-').collect();
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

/// Writes a TOC signed by a leaf of a fresh root; returns (toc, root pem) paths.
fn write_signed_toc(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let root_key = key_pair(50);
    let mut root_params = params("CLI Test MDS Root");
    root_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let root = root_params.self_signed(&root_key).unwrap();

    let mut leaf_params = params("CLI Test TOC Signer");
    leaf_params.is_ca = IsCa::ExplicitNoCa;
    let leaf = leaf_params.signed_by(&key_pair(51), &root, &root_key).unwrap();

    let header = json!({ "alg": "ES256", "typ": "JWT", "x5c": [STANDARD.encode(leaf.der())] });
    let body = json!({
        "no": 7,
        "nextUpdate": "2099-06-01",
        "entries": [
            { "aaguid": AAGUID, "statusReports": [{ "status": "FIDO_CERTIFIED" }] },
            { "aaid": "4e4e#4005", "statusReports": [{ "status": "REVOKED" }] }
        ]
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(body.to_string())
    );
    let signature: Signature = signing_key(51).sign(signing_input.as_bytes());
    let token = format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    );

    let toc_path = dir.join("toc.jwt");
    let root_path = dir.join("root.pem");
    fs::write(&toc_path, token).unwrap();
    fs::write(&root_path, root.pem()).unwrap();
    (toc_path, root_path)
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_lists_commands_and_exit_codes() {
    fidelis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("verify-toc"))
        .stdout(predicate::str::contains("metadata"))
        .stdout(predicate::str::contains("Exit codes:"));
}

#[test]
fn test_version() {
    fidelis()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fidelis"));
}

// ============================================================================
// Inspect Tests
// ============================================================================

#[test]
fn test_inspect_raw_cbor() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("attestation.cbor");
    fs::write(&file, none_attestation_object()).unwrap();

    fidelis()
        .args(["inspect", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("none"))
        .stdout(predicate::str::contains(AAGUID))
        .stdout(predicate::str::contains("deadbeef"))
        .stdout(predicate::str::contains("ES256"));
}

#[test]
fn test_inspect_base64url_as_json() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("attestation.txt");
    fs::write(
        &file,
        format!("{}\n", URL_SAFE_NO_PAD.encode(none_attestation_object())),
    )
    .unwrap();

    let output = fidelis()
        .args(["inspect", "--json", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "inspect failed: {output:?}");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["format"], "none");
    assert_eq!(report["sign_count"], 5);
    assert_eq!(report["aaguid"], AAGUID);
    assert_eq!(report["flags"]["user_verified"], true);
    assert_eq!(report["flags"]["backed_up"], false);
    assert_eq!(report["certificates"], json!([]));
}

#[test]
fn test_inspect_missing_file_returns_input_error() {
    // Exit code 66 = EX_NOINPUT
    fidelis()
        .args(["inspect", "nonexistent_attestation.cbor"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn test_inspect_invalid_data_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("garbage.cbor");
    fs::write(&file, [0xa3, 0xff, 0x00, 0x01]).unwrap();

    // Exit code 65 = EX_DATAERR
    fidelis()
        .args(["inspect", file.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse attestation object"));
}

// ============================================================================
// Verify TOC Tests
// ============================================================================

#[test]
fn test_verify_toc_against_its_root() {
    let temp = TempDir::new().unwrap();
    let (toc, root) = write_signed_toc(temp.path());

    fidelis()
        .args([
            "verify-toc",
            toc.to_str().unwrap(),
            "--root",
            root.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid"))
        .stdout(predicate::str::contains("2099-06-01"))
        .stdout(predicate::str::contains("Entries:"));
}

#[test]
fn test_verify_toc_against_other_root_fails() {
    let temp = TempDir::new().unwrap();
    let (toc, _) = write_signed_toc(temp.path());

    let other_key = key_pair(52);
    let mut other_params = params("Unrelated Root");
    other_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let other = other_params.self_signed(&other_key).unwrap();
    let other_path = temp.path().join("other.pem");
    fs::write(&other_path, other.pem()).unwrap();

    fidelis()
        .args([
            "verify-toc",
            toc.to_str().unwrap(),
            "--root",
            other_path.to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("not trusted"));
}

// ============================================================================
// Metadata Tests
// ============================================================================

#[test]
fn test_metadata_from_statement_directory() {
    let temp = TempDir::new().unwrap();
    let statement = json!({
        "description": "CLI Test Authenticator",
        "aaguid": AAGUID,
        "attestationTypes": ["basic_full"],
        "attestationRootCertificates": []
    });
    fs::write(temp.path().join("key.json"), statement.to_string()).unwrap();

    fidelis()
        .args(["metadata", AAGUID])
        .env("FIDELIS_METADATA_PATHS", temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CLI Test Authenticator"))
        .stdout(predicate::str::contains("basic"));
}

#[test]
fn test_metadata_not_found() {
    fidelis()
        .args(["metadata", AAGUID])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No metadata found"));
}

#[test]
fn test_metadata_invalid_configuration() {
    // Exit code 78 = EX_CONFIG
    fidelis()
        .args(["metadata", AAGUID])
        .env("FIDELIS_MDS_URL", "https://mds.example.com/")
        .assert()
        .code(78)
        .stderr(predicate::str::contains("FIDELIS_MDS_ROOT_CERT"));
}

#[test]
fn test_metadata_rejects_invalid_aaguid() {
    fidelis()
        .args(["metadata", "not-a-uuid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid AAGUID"));
}
