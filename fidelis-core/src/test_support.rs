//! Certificate and key fixtures shared by unit tests.

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePrivateKey;
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType, IsCa,
    KeyPair,
};

use crate::authenticator_data::{AuthenticatorData, FLAG_AT, FLAG_UP};
use crate::buffer::ByteBuffer;
use crate::cose::{CoseAlgorithm, CoseCurve, CoseKey};
use crate::pki::X509Certificate;

/// Deterministic P-256 key derived from a one-byte seed.
pub(crate) fn signing_key(seed: u8) -> SigningKey {
    let mut bytes = [seed; 32];
    bytes[0] = 0x01;
    SigningKey::from_slice(&bytes).unwrap()
}

pub(crate) fn key_pair(seed: u8) -> KeyPair {
    let der = signing_key(seed).to_pkcs8_der().unwrap();
    KeyPair::try_from(der.as_bytes()).unwrap()
}

pub(crate) fn cose_key(seed: u8) -> CoseKey {
    let point = signing_key(seed).verifying_key().to_encoded_point(false);
    CoseKey::ec2(
        CoseAlgorithm::Es256,
        CoseCurve::P256,
        ByteBuffer::from(&point.x().unwrap()[..]),
        ByteBuffer::from(&point.y().unwrap()[..]),
    )
    .unwrap()
}

/// DER ECDSA signature over `message`.
pub(crate) fn sign(seed: u8, message: &[u8]) -> Vec<u8> {
    let signature: Signature = signing_key(seed).sign(message);
    signature.to_der().as_bytes().to_vec()
}

pub(crate) fn params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params
}

pub(crate) fn with_extension(
    mut params: CertificateParams,
    oid: &[u64],
    content: Vec<u8>,
    critical: bool,
) -> CertificateParams {
    let mut extension = CustomExtension::from_oid_content(oid, content);
    extension.set_criticality(critical);
    params.custom_extensions.push(extension);
    params
}

pub(crate) struct TestCa {
    pub cert: X509Certificate,
    rcgen_cert: rcgen::Certificate,
    key: KeyPair,
}

impl TestCa {
    pub(crate) fn root(common_name: &str, seed: u8) -> Self {
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

    pub(crate) fn intermediate(&self, common_name: &str, seed: u8) -> Self {
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

    /// Issue an end-entity certificate for the key derived from `seed`.
    pub(crate) fn issue(&self, mut params: CertificateParams, seed: u8) -> X509Certificate {
        if matches!(params.is_ca, IsCa::NoCa) {
            params.is_ca = IsCa::ExplicitNoCa;
        }
        let cert = params
            .signed_by(&key_pair(seed), &self.rcgen_cert, &self.key)
            .unwrap();
        X509Certificate::from_der(cert.der().to_vec()).unwrap()
    }
}

pub(crate) const CLIENT_DATA_HASH: [u8; 32] = [0x42; 32];

/// Authenticator data attesting the credential key derived from `credential_seed`.
pub(crate) fn attested_auth_data(aaguid: [u8; 16], credential_seed: u8) -> AuthenticatorData {
    let mut data = vec![0x3c; 32];
    data.push(FLAG_UP | FLAG_AT);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&aaguid);
    data.extend_from_slice(&[0x00, 0x04]);
    data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
    data.extend(cose_key(credential_seed).encode().unwrap());
    AuthenticatorData::parse(ByteBuffer::new(data)).unwrap()
}

/// `authData || clientDataHash`, the message most formats sign.
pub(crate) fn attestation_message(auth_data: &AuthenticatorData) -> Vec<u8> {
    let mut message = auth_data.raw().as_slice().to_vec();
    message.extend_from_slice(&CLIENT_DATA_HASH);
    message
}
