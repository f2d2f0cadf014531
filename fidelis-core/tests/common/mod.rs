//! Fixtures for integration tests: deterministic keys, rcgen certificates and
//! attestation objects.

#![allow(dead_code)]

use fidelis_core::authenticator_data::{FLAG_AT, FLAG_UP};
use fidelis_core::cbor::{self, CborMap, CborValue};
use fidelis_core::cose::{CoseAlgorithm, CoseCurve};
use fidelis_core::{AttestationObject, ByteBuffer, CoseKey, X509Certificate};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType, IsCa,
    KeyPair,
};
use sha2::{Digest, Sha256};

pub const CLIENT_DATA_HASH: [u8; 32] = [0x7a; 32];
pub const CREDENTIAL_ID: [u8; 8] = [0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80];
pub const AAGUID: [u8; 16] = [
    0xcb, 0x69, 0x48, 0x1e, 0x8f, 0xf7, 0x40, 0x39, 0x93, 0xec, 0x0a, 0x27, 0x29, 0xa1, 0x54, 0xa8,
];
pub const AAGUID_STR: &str = "cb69481e-8ff7-4039-93ec-0a2729a154a8";

pub fn signing_key(seed: u8) -> SigningKey {
    let mut bytes = [seed; 32];
    bytes[0] = 0x02;
    SigningKey::from_slice(&bytes).unwrap()
}

pub fn key_pair(seed: u8) -> KeyPair {
    let der = signing_key(seed).to_pkcs8_der().unwrap();
    KeyPair::try_from(der.as_bytes()).unwrap()
}

pub fn cose_key(seed: u8) -> CoseKey {
    let point = signing_key(seed).verifying_key().to_encoded_point(false);
    CoseKey::ec2(
        CoseAlgorithm::Es256,
        CoseCurve::P256,
        ByteBuffer::new(point.x().unwrap().to_vec()),
        ByteBuffer::new(point.y().unwrap().to_vec()),
    )
    .unwrap()
}

pub fn sign_der(seed: u8, message: &[u8]) -> Vec<u8> {
    let signature: Signature = signing_key(seed).sign(message);
    signature.to_der().as_bytes().to_vec()
}

/// Fixed-width `r || s`, as JWS carries it.
pub fn sign_raw(seed: u8, message: &[u8]) -> Vec<u8> {
    let signature: Signature = signing_key(seed).sign(message);
    signature.to_bytes().to_vec()
}

pub fn params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
}

/// Subject and extensions packed attestation certificates must carry.
pub fn packed_params(aaguid: &[u8; 16]) -> CertificateParams {
    let mut params = params("Fidelis Test Authenticator");
    params.distinguished_name.push(DnType::CountryName, "SE");
    params.distinguished_name.push(DnType::OrganizationName, "Fidelis Test");
    params
        .distinguished_name
        .push(DnType::OrganizationalUnitName, "Authenticator Attestation");
    let mut content = vec![0x04, 0x10];
    content.extend_from_slice(aaguid);
    params
        .custom_extensions
        .push(CustomExtension::from_oid_content(&[1, 3, 6, 1, 4, 1, 45724, 1, 1, 4], content));
    params
}

pub struct TestCa {
    pub cert: X509Certificate,
    rcgen_cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub fn root(common_name: &str, seed: u8) -> Self {
        let key = key_pair(seed);
        let mut params = params(common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let rcgen_cert = params.self_signed(&key).unwrap();
        Self {
            cert: X509Certificate::from_der(rcgen_cert.der().to_vec()).unwrap(),
            rcgen_cert,
            key,
        }
    }

    pub fn intermediate(&self, common_name: &str, seed: u8) -> Self {
        let key = key_pair(seed);
        let mut params = params(common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let rcgen_cert = params.signed_by(&key, &self.rcgen_cert, &self.key).unwrap();
        Self {
            cert: X509Certificate::from_der(rcgen_cert.der().to_vec()).unwrap(),
            rcgen_cert,
            key,
        }
    }

    pub fn issue(&self, mut params: CertificateParams, seed: u8) -> X509Certificate {
        params.is_ca = IsCa::ExplicitNoCa;
        let cert = params
            .signed_by(&key_pair(seed), &self.rcgen_cert, &self.key)
            .unwrap();
        X509Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    pub fn pem(&self) -> String {
        self.rcgen_cert.pem()
    }
}

/// Authenticator data with an attested credential for `credential_seed`.
pub fn auth_data(aaguid: &[u8; 16], credential_seed: u8, sign_count: u32) -> Vec<u8> {
    let mut data = rp_id_hash().to_vec();
    data.push(FLAG_UP | FLAG_AT);
    data.extend_from_slice(&sign_count.to_be_bytes());
    data.extend_from_slice(aaguid);
    data.extend_from_slice(&(CREDENTIAL_ID.len() as u16).to_be_bytes());
    data.extend_from_slice(&CREDENTIAL_ID);
    data.extend(cose_key(credential_seed).encode().unwrap());
    data
}

/// SHA-256 of `login.example.com`.
pub fn rp_id_hash() -> [u8; 32] {
    Sha256::digest(b"login.example.com").into()
}

pub fn signed_message(auth_data: &[u8]) -> Vec<u8> {
    let mut message = auth_data.to_vec();
    message.extend_from_slice(&CLIENT_DATA_HASH);
    message
}

pub fn x5c(certificates: &[&X509Certificate]) -> CborValue {
    CborValue::Array(
        certificates
            .iter()
            .map(|cert| CborValue::bytes(cert.der().as_slice().to_vec()))
            .collect(),
    )
}

pub fn attestation_object(format: &str, statement: CborMap, auth_data: Vec<u8>) -> AttestationObject {
    let encoded = encode_attestation_object(format, statement, auth_data);
    AttestationObject::parse(&ByteBuffer::new(encoded)).unwrap()
}

pub fn encode_attestation_object(format: &str, statement: CborMap, auth_data: Vec<u8>) -> Vec<u8> {
    let map = CborMap::new()
        .with(CborValue::text("fmt"), CborValue::text(format))
        .unwrap()
        .with(CborValue::text("attStmt"), CborValue::Map(statement))
        .unwrap()
        .with(CborValue::text("authData"), CborValue::bytes(auth_data))
        .unwrap();
    cbor::encode(&CborValue::Map(map)).unwrap()
}

/// A packed statement with an x5c chain: leaf signed by `root`, key `leaf_seed`.
pub fn packed_basic(root: &TestCa, leaf_seed: u8) -> AttestationObject {
    let leaf = root.issue(packed_params(&AAGUID), leaf_seed);
    let data = auth_data(&AAGUID, 1, 0);
    let statement = CborMap::new()
        .with(CborValue::text("alg"), CborValue::from_int(-7))
        .unwrap()
        .with(
            CborValue::text("sig"),
            CborValue::bytes(sign_der(leaf_seed, &signed_message(&data))),
        )
        .unwrap()
        .with(CborValue::text("x5c"), x5c(&[&leaf]))
        .unwrap();
    attestation_object("packed", statement, data)
}

/// Statement JSON naming `roots` as attestation roots.
pub fn statement_json(description: &str, roots: &[&X509Certificate]) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "aaguid": AAGUID_STR,
        "attestationTypes": ["basic_full"],
        "attestationRootCertificates": roots
            .iter()
            .map(|cert| cert.der().to_base64())
            .collect::<Vec<_>>(),
    })
}
