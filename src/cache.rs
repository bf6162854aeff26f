//! Cache backend boundary and an in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::BoxError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend error: {0}")]
    Backend(#[source] BoxError),
}

/// A string key/value store with per-entry expiry.
///
/// Both operations may fail independently; callers decide how to degrade.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` for `ttl_secs` seconds.
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError>;
}

/// Sets between two sweeps of expired entries.
const SWEEP_INTERVAL: usize = 64;

struct Entry {
    value: String,
    /// `None` when the TTL does not fit in an `Instant`; such entries never
    /// expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local cache.
///
/// An expired entry is dropped when it is read, and every
/// [`SWEEP_INTERVAL`]th `set` drops all expired entries, so keys that are
/// never read again do not pile up. A TTL of zero stores an entry that is
/// already expired.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    sets: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live and expired entries not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry now.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), CacheError> {
        if self.sets.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }
        let expires_at = Instant::now().checked_add(Duration::from_secs(ttl_secs));
        self.entries.insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }
}
