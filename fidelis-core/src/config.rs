//! Configuration module
//!
//! Loads metadata sources and trust policy from `FIDELIS_*` environment
//! variables, and wires them into a resolver and a decision manager.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::attestation::AttestationType;
use crate::cache::{CacheProvider, FileCacheProvider, MemoryCacheProvider};
use crate::error::{FidelisError, Result};
use crate::metadata::{MetadataResolver, StatementMetadataProvider};
use crate::policy::{
    SupportedAttestationTypeVoter, TrustAttestationTypeVoter, TrustChainVoter,
    TrustDecisionManager, UndesiredStatusReportVoter,
};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidelisConfig {
    /// TOC URL of a FIDO metadata service.
    pub mds_url: Option<Url>,
    pub mds_token: Option<String>,
    /// PEM root certificate the TOC signing chain must lead to.
    pub mds_root_cert: Option<PathBuf>,
    /// Statement files or directories.
    pub metadata_paths: Vec<PathBuf>,
    /// File cache root. Memory cache when unset.
    pub cache_dir: Option<PathBuf>,
    pub allow_none_attestation: bool,
    pub allow_self_attestation: bool,
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
}

impl Default for FidelisConfig {
    fn default() -> Self {
        Self {
            mds_url: None,
            mds_token: None,
            mds_root_cert: None,
            metadata_paths: Vec::new(),
            cache_dir: None,
            allow_none_attestation: false,
            allow_self_attestation: false,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            http_max_retries: DEFAULT_HTTP_MAX_RETRIES,
        }
    }
}

impl FidelisConfig {
    /// Load configuration from environment variables
    ///
    /// - `FIDELIS_MDS_URL`, `FIDELIS_MDS_TOKEN`, `FIDELIS_MDS_ROOT_CERT`
    /// - `FIDELIS_METADATA_PATHS` - comma-separated files or directories
    /// - `FIDELIS_CACHE_DIR`
    /// - `FIDELIS_ALLOW_NONE_ATTESTATION`, `FIDELIS_ALLOW_SELF_ATTESTATION` (default: false)
    /// - `FIDELIS_HTTP_TIMEOUT_SECS` (default: 30), `FIDELIS_HTTP_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`FidelisConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let mds_url = var("FIDELIS_MDS_URL")
            .map(|value| {
                Url::parse(value.trim()).map_err(|e| invalid("FIDELIS_MDS_URL", &value, e))
            })
            .transpose()?;

        let metadata_paths = var("FIDELIS_METADATA_PATHS")
            .map(|paths| {
                paths
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            mds_url,
            mds_token: var("FIDELIS_MDS_TOKEN"),
            mds_root_cert: var("FIDELIS_MDS_ROOT_CERT").map(PathBuf::from),
            metadata_paths,
            cache_dir: var("FIDELIS_CACHE_DIR").map(PathBuf::from),
            allow_none_attestation: var("FIDELIS_ALLOW_NONE_ATTESTATION")
                .map(|v| parse_bool("FIDELIS_ALLOW_NONE_ATTESTATION", &v))
                .transpose()?
                .unwrap_or(defaults.allow_none_attestation),
            allow_self_attestation: var("FIDELIS_ALLOW_SELF_ATTESTATION")
                .map(|v| parse_bool("FIDELIS_ALLOW_SELF_ATTESTATION", &v))
                .transpose()?
                .unwrap_or(defaults.allow_self_attestation),
            http_timeout_secs: var("FIDELIS_HTTP_TIMEOUT_SECS")
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|e| invalid("FIDELIS_HTTP_TIMEOUT_SECS", &v, e))
                })
                .transpose()?
                .unwrap_or(defaults.http_timeout_secs),
            http_max_retries: var("FIDELIS_HTTP_MAX_RETRIES")
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|e| invalid("FIDELIS_HTTP_MAX_RETRIES", &v, e))
                })
                .transpose()?
                .unwrap_or(defaults.http_max_retries),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mds_url.is_some() && self.mds_root_cert.is_none() {
            return Err(FidelisError::configuration(
                "FIDELIS_MDS_ROOT_CERT is required when FIDELIS_MDS_URL is set",
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(FidelisError::configuration(
                "FIDELIS_HTTP_TIMEOUT_SECS must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy {
            allow_none_attestation: self.allow_none_attestation,
            allow_self_attestation: self.allow_self_attestation,
        }
    }

    pub fn cache_provider(&self) -> Arc<dyn CacheProvider> {
        match &self.cache_dir {
            Some(dir) => Arc::new(FileCacheProvider::new(dir)),
            None => Arc::new(MemoryCacheProvider::new()),
        }
    }

    /// Statement providers first, then the metadata service.
    pub fn metadata_resolver(&self) -> Result<MetadataResolver> {
        let mut resolver = MetadataResolver::new();
        for path in &self.metadata_paths {
            resolver.add_provider(Box::new(StatementMetadataProvider::load(path)?));
        }
        if let Some(url) = &self.mds_url {
            resolver.add_provider(Box::new(self.metadata_service(url)?));
        }
        info!(providers = ?resolver.provider_names(), "Metadata resolver configured");
        Ok(resolver)
    }

    #[cfg(feature = "network")]
    fn metadata_service(&self, url: &Url) -> Result<crate::metadata::MetadataServiceProvider> {
        use crate::downloader::{HttpDownloader, HttpDownloaderConfig};
        use crate::metadata::MetadataServiceProvider;
        use crate::pki::X509Certificate;

        let root_path = self.mds_root_cert.as_ref().ok_or_else(|| {
            FidelisError::configuration("FIDELIS_MDS_ROOT_CERT is required when FIDELIS_MDS_URL is set")
        })?;
        let pem = std::fs::read_to_string(root_path).map_err(|e| {
            FidelisError::configuration(format!("Failed to read {}: {e}", root_path.display()))
        })?;
        let root = X509Certificate::from_pem(&pem)?;

        let downloader = HttpDownloader::new(HttpDownloaderConfig {
            timeout: std::time::Duration::from_secs(self.http_timeout_secs),
            max_retries: self.http_max_retries,
            ..Default::default()
        })?;
        let provider = MetadataServiceProvider::new(
            url.clone(),
            root,
            Arc::new(downloader),
            self.cache_provider().as_ref(),
        )?;
        Ok(match &self.mds_token {
            Some(token) => provider.with_token(token.clone()),
            None => provider,
        })
    }

    #[cfg(not(feature = "network"))]
    fn metadata_service(&self, _: &Url) -> Result<crate::metadata::MetadataServiceProvider> {
        Err(FidelisError::configuration(
            "FIDELIS_MDS_URL requires the `network` feature",
        ))
    }
}

/// Which registrations are trusted without a certificate chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustPolicy {
    pub allow_none_attestation: bool,
    pub allow_self_attestation: bool,
}

impl TrustPolicy {
    /// Vetoes first, then the type allowances, then the chain check.
    pub fn decision_manager(&self) -> TrustDecisionManager {
        let mut manager = TrustDecisionManager::new()
            .with_voter(Box::new(SupportedAttestationTypeVoter))
            .with_voter(Box::new(UndesiredStatusReportVoter));
        if self.allow_none_attestation {
            manager.add_voter(Box::new(TrustAttestationTypeVoter::new(AttestationType::None)));
        }
        if self.allow_self_attestation {
            manager.add_voter(Box::new(TrustAttestationTypeVoter::new(
                AttestationType::SelfAttestation,
            )));
        }
        manager.with_voter(Box::new(TrustChainVoter::default()))
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(name, value, "expected true or false")),
    }
}

fn invalid(name: &str, value: &str, reason: impl std::fmt::Display) -> FidelisError {
    FidelisError::configuration(format!("Invalid {name} '{value}': {reason}"))
}
