//! On-disk cache of API responses.
//!
//! Entries are JSON files named by the blake3 hash of the request (endpoint
//! plus query parameters, API key excluded) and expire after a TTL.

use crate::error::{Result, XcError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    request: String,
    body: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: TimeDelta,
}

impl ResponseCache {
    /// Cache in `dir` with a 24 hour TTL. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: TimeDelta::hours(24),
        }
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable cache key for a request. Parameter order matters; callers
    /// build parameters in a fixed order.
    pub fn key(endpoint: &str, params: &[(&str, String)]) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(endpoint.as_bytes());
        for (k, v) in params {
            if *k == "key" {
                continue;
            }
            hasher.update(b"\0");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Cached body for `key`, or `None` if absent, expired or unreadable.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.get_at(key, Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<serde_json::Value> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("ignoring corrupt cache entry {}: {e}", path.display());
                return None;
            }
        };
        if now - entry.fetched_at > self.ttl {
            log::debug!("cache entry for {} expired", entry.request);
            return None;
        }
        Some(entry.body)
    }

    pub fn put(&self, key: &str, request: &str, body: &serde_json::Value) -> Result<()> {
        self.put_at(key, request, body, Utc::now())
    }

    fn put_at(&self, key: &str, request: &str, body: &serde_json::Value, now: DateTime<Utc>) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| XcError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;
        let entry = CacheEntry {
            fetched_at: now,
            request: request.to_string(),
            body: body.clone(),
        };
        let path = self.path_for(key);
        let text = serde_json::to_string(&entry)?;
        std::fs::write(&path, text).map_err(|source| XcError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(XcError::Io {
                path: self.dir.display().to_string(),
                source,
            }),
        }
    }
}
