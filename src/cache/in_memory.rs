//! In-memory session backend backed by moka
//!
//! Sessions are bounded by entry count and expire individually. Entries are
//! not shared with other processes, so the refresh lock only has to work
//! within this one.

use crate::error::Result;
use crate::traits::cache::Cache;
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use std::time::{Duration, Instant};

/// TTL used when a caller does not pass one (7 days, the default cookie expiry)
const DEFAULT_TTL: Duration = Duration::from_secs(3600 * 24 * 7);

#[derive(Clone)]
struct StoredEntry {
    value: Vec<u8>,
    ttl: Option<Duration>,
}

/// Per-entry expiry: each save restarts the entry's clock, reads never do
struct EntryExpiry {
    default_ttl: Duration,
}

impl Expiry<String, StoredEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl.unwrap_or(self.default_ttl))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl.unwrap_or(self.default_ttl))
    }
}

/// Process-local session backend
#[derive(Clone)]
pub struct InMemoryCache {
    inner: MokaCache<String, StoredEntry>,
}

impl InMemoryCache {
    /// Create a backend holding at most `max_entries` sessions
    ///
    /// When full, moka's TinyLFU policy evicts the least useful sessions;
    /// their owners simply have to sign in again.
    pub fn new(max_entries: u64) -> Self {
        Self::with_ttl(max_entries, DEFAULT_TTL)
    }

    /// Create a backend with a custom default TTL
    pub fn with_ttl(max_entries: u64, default_ttl: Duration) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryExpiry { default_ttl })
            .build();

        Self { inner }
    }

    /// Run pending maintenance tasks (eviction, expiration)
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Get the current number of stored sessions
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key).await.map(|entry| entry.value))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.inner
            .insert(key.to_string(), StoredEntry { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(key).await;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
