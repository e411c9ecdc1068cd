//! Persistent TTL cache for expensive lookups
//!
//! The [`CacheStore`] keeps values grouped by a cache *type* (for example
//! `extension` for resources fetched through `!ext` tags) and keyed by an
//! arbitrary string. Each entry carries the UTC timestamp at which it was
//! stored; expiry is checked lazily on read against the retention hours
//! configured for its type.
//!
//! On disk the cache is a single YAML document:
//!
//! ```yaml
//! extension:
//!   "https://example.com/data.yaml $.items":
//!     timestamp: 2024-05-01T10:00:00Z
//!     data: [...]
//! ```
//!
//! Problems loading the file are never fatal. A missing, corrupted or
//! structurally invalid file is logged and the store starts empty. Without a
//! path the store lives only in memory for the current run.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Error, Result};

/// Cache type used for resolved external tag values.
pub const EXTENSION_CACHE_TYPE: &str = "extension";

/// A single cached value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the value was stored
    pub timestamp: DateTime<Utc>,
    /// The cached value
    pub data: Value,
}

type CacheData = BTreeMap<String, BTreeMap<String, CacheEntry>>;

/// TTL-keyed cache, loaded once per run and flushed with [`CacheStore::save`].
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: Option<PathBuf>,
    retention_hours: HashMap<String, f64>,
    entries: CacheData,
}

impl CacheStore {
    /// Create an in-memory cache that is never persisted.
    pub fn in_memory(retention_hours: HashMap<String, f64>) -> Self {
        Self {
            path: None,
            retention_hours,
            entries: CacheData::new(),
        }
    }

    /// Load the cache from `path`, falling back to an empty cache when the
    /// file is missing, unreadable or invalid.
    pub fn load(path: Option<PathBuf>, retention_hours: HashMap<String, f64>) -> Self {
        let Some(path) = path else {
            warn!("No filepath provided for cache; initialized a new in-memory cache");
            return Self::in_memory(retention_hours);
        };
        let entries = match read_cache_file(&path) {
            Ok(Some(entries)) => {
                info!("Loaded cache from {}", path.display());
                entries
            }
            Ok(None) => {
                warn!(
                    "Cache file {} does not exist; initialized a new cache",
                    path.display()
                );
                CacheData::new()
            }
            Err(e) => {
                warn!(
                    "Cache file {} is invalid ({}); initialized a new cache",
                    path.display(),
                    e
                );
                CacheData::new()
            }
        };
        Self {
            path: Some(path),
            retention_hours,
            entries,
        }
    }

    /// Path the cache is persisted to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Retrieve a live value. Types without configured retention always miss.
    pub fn get(&self, typ: &str, key: &str) -> Option<&Value> {
        self.get_at(typ, key, Utc::now())
    }

    /// Retrieve a live value as of `now`.
    pub fn get_at(&self, typ: &str, key: &str, now: DateTime<Utc>) -> Option<&Value> {
        let Some(hours) = self.retention_hours.get(typ) else {
            warn!(
                "Retention hours not defined for cache type '{}'; skipped cache retrieval",
                typ
            );
            return None;
        };
        let Some(entry) = self.entries.get(typ).and_then(|items| items.get(key)) else {
            debug!("Cache miss for {}.{}", typ, key);
            return None;
        };
        if is_expired(entry.timestamp, *hours, now) {
            debug!(
                "Cache item {}.{} expired (timestamp: {}, retention hours: {})",
                typ, key, entry.timestamp, hours
            );
            return None;
        }
        debug!("Cache hit for {}.{}", typ, key);
        Some(&entry.data)
    }

    /// Store a value stamped with the current time.
    pub fn set(&mut self, typ: &str, key: &str, value: Value) {
        self.set_at(typ, key, value, Utc::now());
    }

    /// Store a value with an explicit timestamp.
    pub fn set_at(&mut self, typ: &str, key: &str, value: Value, timestamp: DateTime<Utc>) {
        debug!("Cache set for {}.{}", typ, key);
        self.entries.entry(typ.to_string()).or_default().insert(
            key.to_string(),
            CacheEntry {
                timestamp,
                data: value,
            },
        );
    }

    /// Number of stored entries across all types, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist the cache. The file is written to a temporary sibling and
    /// renamed into place.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            warn!("No filepath provided for cache; skipped saving cache");
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
                message: format!("Failed to create directory '{}': {}", parent.display(), e),
            })?;
        }
        let content = serde_yaml::to_string(&self.entries)?;
        let tmp_path = path.with_extension("yaml.tmp");
        fs::write(&tmp_path, content).map_err(|e| Error::Filesystem {
            message: format!("Failed to write cache '{}': {}", tmp_path.display(), e),
        })?;
        fs::rename(&tmp_path, path).map_err(|e| Error::Filesystem {
            message: format!("Failed to move cache into '{}': {}", path.display(), e),
        })?;
        info!("Saved cache to {}", path.display());
        Ok(())
    }
}

fn read_cache_file(path: &Path) -> Result<Option<CacheData>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Some(CacheData::new()));
    }
    let entries: CacheData = serde_yaml::from_str(&content)?;
    Ok(Some(entries))
}

fn is_expired(timestamp: DateTime<Utc>, retention_hours: f64, now: DateTime<Utc>) -> bool {
    let retention = Duration::milliseconds((retention_hours * 3_600_000.0) as i64);
    timestamp + retention <= now
}
