//! X.509 certificates, chain validation, trust paths and trust anchors.

mod certificate;
mod chain;
mod trust_anchor;
mod trust_path;

pub use certificate::{CertificateExtension, SubjectName, X509Certificate};
pub use chain::{ChainValidator, SignatureChainValidator};
pub use trust_anchor::{TrustAnchor, TrustAnchorSet};
pub use trust_path::{TrustPath, TrustPathValidator};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::OID_FIDO_GEN_CE_AAGUID;
    use crate::cose::CoseAlgorithm;
    use crate::test_support::{cose_key, params, with_extension, TestCa};
    use rcgen::{DnType, ExtendedKeyUsagePurpose};

    #[test]
    fn test_certificate_accessors() {
        let root = TestCa::root("Root", 1);
        let mut leaf_params = params("Leaf CN");
        leaf_params.distinguished_name.push(DnType::CountryName, "SE");
        leaf_params
            .distinguished_name
            .push(DnType::OrganizationalUnitName, "Authenticator Attestation");
        let leaf_params = with_extension(
            leaf_params,
            &[1, 3, 6, 1, 4, 1, 45724, 1, 1, 4],
            vec![0x04, 0x02, 0xab, 0xcd],
            false,
        );
        let leaf = root.issue(leaf_params, 3);

        assert_eq!(leaf.version().unwrap(), 3);
        let subject = leaf.subject().unwrap();
        assert_eq!(subject.common_name.as_deref(), Some("Leaf CN"));
        assert_eq!(subject.country.as_deref(), Some("SE"));
        assert_eq!(
            subject.organizational_unit.as_deref(),
            Some("Authenticator Attestation")
        );
        assert_eq!(subject.organization, None);
        assert_eq!(leaf.is_ca().unwrap(), Some(false));
        assert_eq!(root.cert.is_ca().unwrap(), Some(true));

        let ext = leaf.extension(OID_FIDO_GEN_CE_AAGUID).unwrap().expect("extension");
        assert!(!ext.critical);
        assert_eq!(ext.value.as_slice(), &[0x04, 0x02, 0xab, 0xcd]);
        assert!(leaf.extension("1.2.3.4").unwrap().is_none());
    }

    #[test]
    fn test_extended_key_usages() {
        let root = TestCa::root("Root", 1);
        let mut leaf_params = params("AIK");
        leaf_params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::Other(vec![2, 23, 133, 8, 3]),
        ];
        let leaf = root.issue(leaf_params, 4);

        let usages = leaf.extended_key_usages().unwrap();
        assert_eq!(usages, vec!["1.3.6.1.5.5.7.3.2", "2.23.133.8.3"], "named first, then other");
        assert!(
            root.cert.extended_key_usages().unwrap().is_empty(),
            "no extension means no usages"
        );
    }

    #[test]
    fn test_public_key_matches_signing_key() {
        let root = TestCa::root("Root", 1);
        let leaf = root.issue(params("Leaf"), 7);
        assert_eq!(leaf.public_key(CoseAlgorithm::Es256).unwrap(), cose_key(7));

        let err = leaf.public_key(CoseAlgorithm::Rs256).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unsupported);
        let err = leaf.public_key(CoseAlgorithm::Es384).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Unsupported);
    }

    #[test]
    fn test_issued_by() {
        let root = TestCa::root("Root", 1);
        let leaf = root.issue(params("Leaf"), 3);
        assert!(leaf.verify_issued_by(&root.cert).unwrap());
        assert!(!root.cert.verify_issued_by(&leaf).unwrap());
        assert!(root.cert.is_self_issued().unwrap());
    }

    #[test]
    fn test_equality_is_der_identity() {
        let root = TestCa::root("Root", 1);
        let copy = X509Certificate::from_der(root.cert.der().as_slice().to_vec()).unwrap();
        assert_eq!(copy, root.cert);
        assert!(X509Certificate::from_der(vec![0x30, 0x00]).is_err());
    }

    #[test]
    fn test_pem_and_base64_loading() {
        let root = TestCa::root("Root", 1);
        let b64 = root.cert.der().to_base64();
        assert_eq!(X509Certificate::from_base64(&b64).unwrap(), root.cert);

        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            b64
        );
        assert_eq!(X509Certificate::from_pem(&pem).unwrap(), root.cert);
    }
}
