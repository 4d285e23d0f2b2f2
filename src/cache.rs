//! Single-slot, TTL-gated cache of the last aggregation result.
//!
//! The slot also records the keywords and day window it was computed for;
//! a lookup with different parameters is a miss rather than a stale hit.
//! Nothing here raises past [`CacheManager::read`] or [`CacheManager::write`]:
//! a missing, corrupt or stale slot is a miss, and a failed write is logged.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rollup::CorpusResult;

/// Errors from the cache file. Callers normally see them as misses.
#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("failed to read cache file: {path}")]
    #[diagnostic(
        code(coinmood::cache::read),
        help("The cache is optional; delete the file if it keeps failing.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache file {path}: {message}")]
    #[diagnostic(
        code(coinmood::cache::parse),
        help("The entry will be recomputed and overwritten on the next fresh analysis.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write cache file: {path}")]
    #[diagnostic(
        code(coinmood::cache::write),
        help("Ensure the cache directory exists and is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// The persisted slot: request parameters plus the corpus result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub days: u32,
    #[serde(flatten)]
    pub result: CorpusResult,
}

impl CacheEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        keywords: Vec<String>,
        days: u32,
        result: CorpusResult,
    ) -> Self {
        Self {
            timestamp,
            keywords,
            days,
            result,
        }
    }

    /// Whether this entry answers a request for `keywords` over `days`.
    pub fn matches(&self, keywords: &[String], days: u32) -> bool {
        self.days == days && normalized(&self.keywords) == normalized(keywords)
    }
}

fn normalized(keywords: &[String]) -> Vec<String> {
    let mut out: Vec<String> = keywords.iter().map(|k| k.trim().to_lowercase()).collect();
    out.sort();
    out.dedup();
    out
}

/// Why a lookup did not produce an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MissReason {
    Absent,
    Expired { age: chrono::Duration },
    Corrupt { message: String },
    ParamsMismatch,
}

/// Outcome of [`CacheManager::read`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss(MissReason),
}

impl CacheLookup {
    pub fn hit(self) -> Option<CacheEntry> {
        match self {
            Self::Hit(entry) => Some(entry),
            Self::Miss(_) => None,
        }
    }
}

/// Reads and writes the cache slot at a fixed path.
#[derive(Debug, Clone)]
pub struct CacheManager {
    path: PathBuf,
    ttl: chrono::Duration,
}

impl CacheManager {
    pub fn new(path: impl Into<PathBuf>, ttl: chrono::Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Raw slot contents, without TTL or parameter checks.
    pub fn load(&self) -> CacheResult<Option<CacheEntry>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| CacheError::Read {
            path: self.path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Parse {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Look up a fresh entry for the request.
    pub fn read(&self, keywords: &[String], days: u32) -> CacheLookup {
        self.read_at(keywords, days, Utc::now())
    }

    /// Look up an entry that is within the TTL of `now` and matches the request.
    pub fn read_at(&self, keywords: &[String], days: u32, now: DateTime<Utc>) -> CacheLookup {
        let entry = match self.load() {
            Ok(Some(entry)) => entry,
            Ok(None) => return CacheLookup::Miss(MissReason::Absent),
            Err(e) => {
                tracing::warn!(error = %e, "sentiment cache unreadable, treating as miss");
                return CacheLookup::Miss(MissReason::Corrupt {
                    message: e.to_string(),
                });
            }
        };

        let age = now - entry.timestamp;
        if age > self.ttl {
            tracing::debug!(age_minutes = age.num_minutes(), "sentiment cache expired");
            return CacheLookup::Miss(MissReason::Expired { age });
        }
        if !entry.matches(keywords, days) {
            tracing::debug!("sentiment cache holds a different request");
            return CacheLookup::Miss(MissReason::ParamsMismatch);
        }

        tracing::debug!(articles = entry.result.article_count, "sentiment cache hit");
        CacheLookup::Hit(entry)
    }

    /// Persist `entry`, overwriting the slot.
    pub fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        let content = serde_json::to_string_pretty(entry).map_err(|e| CacheError::Parse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, content).map_err(|e| CacheError::Write {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Best-effort [`store`](Self::store): failures are logged, never returned.
    pub fn write(&self, entry: &CacheEntry) -> bool {
        match self.store(entry) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "sentiment cache written");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to write sentiment cache");
                false
            }
        }
    }
}
