//! Keyed, expiring caches for downloaded metadata.
//!
//! Pools are scoped by name (`mds-toc`, `mds-statement`, ...). Entries are
//! idempotent: concurrent writers of the same key store the same bytes, so
//! no locking is done across processes.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FidelisError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheItem {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheItem {
    /// An entry that never expires.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn expires_after(self, ttl: Duration) -> Self {
        self.expires_at(Utc::now() + ttl)
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_hit_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }

    pub fn is_hit(&self) -> bool {
        self.is_hit_at(Utc::now())
    }
}

/// A keyed store. `get` only returns entries that have not expired.
pub trait CachePool: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheItem>>;
    fn set(&self, key: &str, item: CacheItem) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

pub trait CacheProvider: Send + Sync {
    fn get_cache_pool(&self, scope: &str) -> Result<Arc<dyn CachePool>>;
}

#[derive(Debug, Default)]
pub struct MemoryCachePool {
    entries: DashMap<String, CacheItem>,
}

impl CachePool for MemoryCachePool {
    fn get(&self, key: &str) -> Result<Option<CacheItem>> {
        let item = match self.entries.get(key) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        if item.is_hit() {
            Ok(Some(item))
        } else {
            self.entries.remove(key);
            Ok(None)
        }
    }

    fn set(&self, key: &str, item: CacheItem) -> Result<()> {
        self.entries.insert(key.to_string(), item);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Process-local pools, one per scope.
#[derive(Debug, Default)]
pub struct MemoryCacheProvider {
    pools: DashMap<String, Arc<MemoryCachePool>>,
}

impl MemoryCacheProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheProvider for MemoryCacheProvider {
    fn get_cache_pool(&self, scope: &str) -> Result<Arc<dyn CachePool>> {
        let pool = self
            .pools
            .entry(scope.to_string())
            .or_insert_with(|| Arc::new(MemoryCachePool::default()))
            .clone();
        Ok(pool)
    }
}

/// On-disk form of a cache entry.
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(with = "serde_bytes")]
    value: Vec<u8>,
    expires_at: Option<i64>,
}

/// One CBOR file per key under `<root>/<scope>/`.
#[derive(Debug, Clone)]
pub struct FileCachePool {
    dir: PathBuf,
}

impl FileCachePool {
    fn path(&self, key: &str) -> Result<PathBuf> {
        check_name(key, "key")?;
        Ok(self.dir.join(key))
    }
}

impl CachePool for FileCachePool {
    fn get(&self, key: &str) -> Result<Option<CacheItem>> {
        let path = self.path(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FidelisError::cache(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let stored: StoredEntry = match ciborium::from_reader(bytes.as_slice()) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding corrupt cache entry");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove corrupt cache entry");
                }
                return Ok(None);
            }
        };
        let expires_at = match stored.expires_at {
            Some(ts) => Some(
                DateTime::<Utc>::from_timestamp(ts, 0)
                    .ok_or_else(|| FidelisError::cache("Cache entry expiry out of range"))?,
            ),
            None => None,
        };
        let item = CacheItem {
            value: stored.value,
            expires_at,
        };

        if item.is_hit() {
            Ok(Some(item))
        } else {
            debug!(key, "Cache entry expired");
            self.delete(key)?;
            Ok(None)
        }
    }

    fn set(&self, key: &str, item: CacheItem) -> Result<()> {
        let path = self.path(key)?;
        let stored = StoredEntry {
            value: item.value,
            expires_at: item.expires_at.map(|at| at.timestamp()),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&stored, &mut bytes)
            .map_err(|e| FidelisError::cache(format!("Failed to encode cache entry: {e}")))?;

        // Write then rename so readers never see a partial entry.
        let tmp = self.dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, &bytes)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| FidelisError::cache(format!("Failed to write {}: {e}", path.display())))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(FidelisError::cache(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileCacheProvider {
    root: PathBuf,
}

impl FileCacheProvider {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl CacheProvider for FileCacheProvider {
    fn get_cache_pool(&self, scope: &str) -> Result<Arc<dyn CachePool>> {
        check_name(scope, "scope")?;
        let dir = self.root.join(scope);
        fs::create_dir_all(&dir).map_err(|e| {
            FidelisError::cache(format!("Failed to create {}: {e}", dir.display()))
        })?;
        Ok(Arc::new(FileCachePool { dir }))
    }
}

/// Keys and scopes become file names: ASCII letters, digits, `-` and `_` only.
fn check_name(name: &str, what: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(FidelisError::cache(format!("Invalid cache {what} '{name}'")))
    }
}
