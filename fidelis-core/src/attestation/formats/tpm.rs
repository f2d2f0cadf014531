use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use super::{check_aaguid_extension, parse_alg, parse_x5c, signed_data, verify_signature};
use crate::asn1::OID_TCG_KP_AIK_CERTIFICATE;
use crate::attestation::registry::{
    downcast_statement, AttestationFormat, AttestationStatement, AttestationType,
    AttestationVerifier, VerificationResult,
};
use crate::authenticator_data::AuthenticatorData;
use crate::buffer::ByteBuffer;
use crate::cbor::CborMap;
use crate::cose::CoseAlgorithm;
use crate::error::{FidelisError, Result};
use crate::pki::{TrustPath, X509Certificate};
use crate::tpm::{TpmAttest, TpmPublic};

const FORMAT_ID: &str = "tpm";
const TPM_VERSION: &str = "2.0";

/// TPM 2.0 attestation with an AIK certificate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TpmFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct TpmStatement {
    pub algorithm: CoseAlgorithm,
    pub signature: ByteBuffer,
    pub certificates: Vec<X509Certificate>,
    /// Raw TPMS_ATTEST, the signed structure.
    pub cert_info: ByteBuffer,
    pub attest: TpmAttest,
    pub pub_area: TpmPublic,
}

impl AttestationStatement for TpmStatement {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AttestationFormat for TpmFormat {
    fn format_id(&self) -> &str {
        FORMAT_ID
    }

    fn create_statement(&self, statement: &CborMap) -> Result<Box<dyn AttestationStatement>> {
        let version = statement.require_text("ver")?;
        if version != TPM_VERSION {
            return Err(FidelisError::unsupported(format!("TPM version {version}")));
        }
        if statement.contains_text_key("ecdaaKeyId") {
            return Err(FidelisError::unsupported("ECDAA attestation"));
        }

        let cert_info = statement.require_bytes("certInfo")?.clone();
        let pub_area = statement.require_bytes("pubArea")?;
        Ok(Box::new(TpmStatement {
            algorithm: parse_alg(statement)?,
            signature: statement.require_bytes("sig")?.clone(),
            certificates: parse_x5c(statement)?,
            attest: TpmAttest::parse(&cert_info)?,
            cert_info,
            pub_area: TpmPublic::parse(pub_area)?,
        }))
    }

    fn verifier(&self) -> Arc<dyn AttestationVerifier> {
        Arc::new(*self)
    }
}

impl AttestationVerifier for TpmFormat {
    fn verify(
        &self,
        statement: &dyn AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
    ) -> Result<VerificationResult> {
        let statement = downcast_statement::<TpmStatement>(statement, FORMAT_ID)?;

        if !statement.pub_area.matches_cose_key(auth_data.credential_public_key()?) {
            return Err(FidelisError::verification(
                "TPM pubArea does not match the credential public key",
            ));
        }

        let expected_extra_data = statement
            .algorithm
            .hash()?
            .digest(&signed_data(auth_data, client_data_hash));
        if statement.attest.extra_data.as_slice() != expected_extra_data.as_slice() {
            return Err(FidelisError::verification(
                "TPM certInfo extraData does not match the attested data hash",
            ));
        }
        if !statement
            .pub_area
            .is_valid_pub_info_name(&statement.attest.attested_name)?
        {
            return Err(FidelisError::verification(
                "TPM certInfo attested name does not match pubArea",
            ));
        }

        let aik = &statement.certificates[0];
        let aik_key = aik.public_key(statement.algorithm)?;
        verify_signature(
            &aik_key,
            statement.cert_info.as_slice(),
            &statement.signature,
            "TPM certInfo",
        )?;
        check_aik_certificate(aik)?;
        check_aaguid_extension(aik, auth_data)?;
        debug!("tpm attestation verified");

        Ok(VerificationResult::new(
            AttestationType::AttCa,
            TrustPath::CertificateChain(statement.certificates.clone()),
        ))
    }
}

/// AIK certificate requirements (WebAuthn 8.3.1).
fn check_aik_certificate(certificate: &X509Certificate) -> Result<()> {
    let version = certificate.version()?;
    if version != 3 {
        return Err(FidelisError::verification(format!(
            "AIK certificate must be version 3, found {version}"
        )));
    }
    if !certificate.subject()?.is_empty() {
        return Err(FidelisError::verification("AIK certificate subject must be empty"));
    }
    if !certificate
        .extended_key_usages()?
        .iter()
        .any(|oid| oid == OID_TCG_KP_AIK_CERTIFICATE)
    {
        return Err(FidelisError::verification(
            "AIK certificate is missing the tcg-kp-AIKCertificate key usage",
        ));
    }
    if certificate.is_ca()? == Some(true) {
        return Err(FidelisError::verification("AIK certificate must not be a CA"));
    }
    Ok(())
}
