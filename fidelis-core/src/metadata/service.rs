//! FIDO Metadata Service provider.

use std::sync::Arc;

use chrono::Duration;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::models::{Metadata, MetadataStatement};
use super::provider::MetadataProvider;
use super::toc::MetadataToc;
use crate::buffer::ByteBuffer;
use crate::cache::{CacheItem, CachePool, CacheProvider};
use crate::downloader::Downloader;
use crate::error::{FidelisError, Result};
use crate::pki::{ChainValidator, SignatureChainValidator, TrustPathValidator, X509Certificate};
use crate::registration::MetadataIdentifier;

pub const TOC_CACHE_SCOPE: &str = "mds-toc";
pub const STATEMENT_CACHE_SCOPE: &str = "mds-statement";

const STATEMENT_TTL_DAYS: i64 = 1;

/// Resolves metadata from a signed TOC and the statements it references.
pub struct MetadataServiceProvider {
    toc_url: Url,
    token: Option<String>,
    root: X509Certificate,
    downloader: Arc<dyn Downloader>,
    toc_cache: Arc<dyn CachePool>,
    statement_cache: Arc<dyn CachePool>,
    trust_path_validator: TrustPathValidator,
}

impl MetadataServiceProvider {
    pub fn new(
        toc_url: Url,
        root: X509Certificate,
        downloader: Arc<dyn Downloader>,
        cache: &dyn CacheProvider,
    ) -> Result<Self> {
        Ok(Self {
            toc_url,
            token: None,
            root,
            downloader,
            toc_cache: cache.get_cache_pool(TOC_CACHE_SCOPE)?,
            statement_cache: cache.get_cache_pool(STATEMENT_CACHE_SCOPE)?,
            trust_path_validator: TrustPathValidator::new(Arc::new(SignatureChainValidator::new())),
        })
    }

    /// Access token sent as the `token` query parameter to the TOC host.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_chain_validator(mut self, chain_validator: Arc<dyn ChainValidator>) -> Self {
        self.trust_path_validator = TrustPathValidator::new(chain_validator);
        self
    }

    /// Adds the token to URLs on the TOC host only, so it never leaks to
    /// other hosts named in the TOC.
    fn authorize(&self, url: &Url) -> Url {
        let mut url = url.clone();
        if let Some(token) = &self.token {
            if url.host_str() == self.toc_url.host_str() {
                url.query_pairs_mut().append_pair("token", token);
            }
        }
        url
    }

    /// The verified TOC, from cache while `nextUpdate` is in the future.
    pub fn get_toc(&self) -> Result<MetadataToc> {
        let url = self.authorize(&self.toc_url);
        let key = hex::encode(Sha256::digest(url.as_str().as_bytes()));

        if let Some(item) = self.toc_cache.get(&key)? {
            match serde_json::from_slice::<MetadataToc>(item.value()) {
                Ok(toc) => {
                    debug!(no = toc.no, "Using cached TOC");
                    return Ok(toc);
                }
                Err(e) => warn!(error = %e, "Ignoring unreadable cached TOC"),
            }
        }

        let file = self.downloader.download_file(&url)?;
        let token = std::str::from_utf8(&file.data)
            .map_err(|_| FidelisError::parse("TOC is not UTF-8 text"))?;
        let toc = MetadataToc::verify(token, &self.root, &self.trust_path_validator)?;

        let encoded = serde_json::to_vec(&toc)
            .map_err(|e| FidelisError::cache(format!("Failed to encode TOC: {e}")))?;
        self.toc_cache
            .set(&key, CacheItem::new(encoded).expires_at(toc.next_update_time()?))?;
        info!(no = toc.no, entries = toc.entries.len(), next_update = %toc.next_update, "Downloaded metadata TOC");
        Ok(toc)
    }

    /// Fetches the statement at `url`, checking it against the base64url
    /// SHA-256 `hash` from the TOC.
    fn get_statement(&self, url: &str, hash: &str) -> Result<MetadataStatement> {
        let expected = ByteBuffer::from_base64_url(hash)?;
        let key = expected.to_hex();

        if let Some(item) = self.statement_cache.get(&key)? {
            match serde_json::from_slice::<MetadataStatement>(item.value()) {
                Ok(statement) => {
                    debug!(hash = %key, "Using cached metadata statement");
                    return Ok(statement);
                }
                Err(e) => warn!(error = %e, "Ignoring unreadable cached statement"),
            }
        }

        let url = Url::parse(url)
            .map_err(|e| FidelisError::parse(format!("Invalid metadata statement URL: {e}")))?;
        let file = self.downloader.download_file(&self.authorize(&url))?;
        if Sha256::digest(&file.data)[..] != *expected.as_slice() {
            return Err(FidelisError::verification(
                "Metadata statement hash does not match the TOC",
            ));
        }

        let text = std::str::from_utf8(&file.data)
            .map_err(|_| FidelisError::parse("Metadata statement is not base64url text"))?;
        let json = ByteBuffer::from_base64_url(text.trim())?;
        let statement: MetadataStatement = serde_json::from_slice(json.as_slice())
            .map_err(|e| FidelisError::parse(format!("Invalid metadata statement: {e}")))?;

        self.statement_cache.set(
            &key,
            CacheItem::new(json.into_vec()).expires_after(Duration::days(STATEMENT_TTL_DAYS)),
        )?;
        Ok(statement)
    }
}

impl MetadataProvider for MetadataServiceProvider {
    fn name(&self) -> &str {
        "metadata-service"
    }

    #[instrument(level = "debug", skip_all, fields(identifier = %identifier))]
    fn lookup(&self, identifier: &MetadataIdentifier) -> Result<Option<Metadata>> {
        let toc = self.get_toc()?;
        let entry = match toc.find(identifier) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if let Some(statement) = &entry.metadata_statement {
            return Metadata::from_statement(statement.clone(), entry.status_reports.clone())
                .map(Some);
        }

        let (url, hash) = match (&entry.url, &entry.hash) {
            (Some(url), Some(hash)) => (url, hash),
            _ => {
                debug!("TOC entry has no statement location");
                return Ok(None);
            }
        };
        let statement = self.get_statement(url, hash)?;
        Metadata::from_statement(statement, entry.status_reports.clone()).map(Some)
    }
}
