//! Fidelis Core - WebAuthn attestation and trust verification library
//!
//! This crate verifies what a relying party receives from FIDO2 authenticators:
//! attestation objects at registration and assertions at sign-in, and decides
//! whether an authenticator is trusted using FIDO metadata.
//!
//! # Features
//!
//! - Canonical CBOR codec and COSE keys (ECDSA P-256/P-384, RSA PKCS#1 v1.5 and PSS)
//! - Attestation formats: none, fido-u2f, packed, tpm, android-key, android-safetynet, apple
//! - X.509 trust paths validated against trust anchors
//! - Trust decisions by independent voters
//! - FIDO Metadata Service TOC verification with expiring caches
//!
//! # Example
//!
//! ```no_run
//! use fidelis_core::{
//!     verify_registration, AttestationFormatRegistry, AttestationObject, ByteBuffer,
//!     FidelisConfig,
//! };
//!
//! # fn example(attestation_object: Vec<u8>, client_data_hash: [u8; 32]) -> fidelis_core::Result<()> {
//! let config = FidelisConfig::from_env()?;
//! let registry = AttestationFormatRegistry::with_default_formats();
//!
//! let object = AttestationObject::parse(&ByteBuffer::new(attestation_object))?;
//! let registration = verify_registration(&registry, &object, &client_data_hash)?;
//!
//! let metadata = config.metadata_resolver()?.get_metadata(&registration);
//! config
//!     .trust_policy()
//!     .decision_manager()
//!     .verify_trust(&registration, metadata.as_ref())?;
//! # Ok(())
//! # }
//! ```

pub mod aaguid;
pub mod asn1;
pub mod assertion;
pub mod attestation;
pub mod authenticator_data;
pub mod buffer;
pub mod cache;
pub mod cbor;
pub mod config;
pub mod cose;
pub mod credential_store;
pub mod downloader;
pub mod error;
pub mod jwt;
pub mod metadata;
pub mod pki;
pub mod policy;
pub mod registration;
pub mod tpm;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use aaguid::Aaguid;
pub use assertion::{AssertionRequest, AssertionResult, AssertionVerifier};
pub use attestation::{
    AttestationFormat, AttestationFormatRegistry, AttestationObject, AttestationStatement,
    AttestationType, AttestationVerifier, VerificationResult,
};
pub use authenticator_data::AuthenticatorData;
pub use buffer::ByteBuffer;
pub use cache::{CacheItem, CachePool, CacheProvider, FileCacheProvider, MemoryCacheProvider};
pub use config::{FidelisConfig, TrustPolicy};
pub use cose::{CoseAlgorithm, CoseCurve, CoseKey};
pub use credential_store::{CredentialStore, MemoryCredentialStore, StoredCredential};
pub use downloader::{DownloadedFile, Downloader};
pub use error::{ErrorKind, FidelisError, Result};
pub use jwt::{Jwt, JwtValidator, ValidationContext};
pub use metadata::{
    Metadata, MetadataProvider, MetadataResolver, MetadataServiceProvider, MetadataStatement,
    MetadataToc, StatementMetadataProvider,
};
pub use pki::{TrustAnchor, TrustAnchorSet, TrustPath, TrustPathValidator, X509Certificate};
pub use policy::{TrustDecisionManager, TrustVote, TrustVoter};
pub use registration::{verify_registration, MetadataIdentifier, RegistrationResult};

// Network-dependent exports
#[cfg(feature = "network")]
pub use downloader::{HttpDownloader, HttpDownloaderConfig};
