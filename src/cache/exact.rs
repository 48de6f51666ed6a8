//! Exact-match cache level: entries, store contract, moka-backed default.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::key::CacheKey;
use crate::types::ChatResponse;
use crate::Result;

/// Cache level that produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    Exact,
    Semantic,
}

impl CacheLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::Exact => "exact",
            CacheLevel::Semantic => "semantic",
        }
    }
}

/// A cached response with its own expiry.
///
/// Entries are never mutated after creation; a refreshed value is a new
/// entry replacing the old one.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: ChatResponse,
    pub created_at: Instant,
    pub ttl: Duration,
    pub level: CacheLevel,
}

impl CacheEntry {
    /// Create a fresh exact-level entry.
    pub fn new(value: ChatResponse, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            level: CacheLevel::Exact,
        }
    }

    /// Copy of this entry tagged with the level that served it.
    pub fn with_level(mut self, level: CacheLevel) -> Self {
        self.level = level;
        self
    }

    /// Lazy expiry check; the entry carries its own deadline.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// Contract for the exact-match key-value backend.
///
/// An error from any method signals backend unavailability; the facade
/// responds by degrading to pass-through rather than failing requests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a non-expired entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert (or replace) an entry; expiry follows `entry.ttl`.
    async fn insert(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    /// Remove one entry.
    async fn remove(&self, key: &CacheKey) -> Result<()>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()>;

    /// Whether a non-expired entry exists for `key`.
    async fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Approximate number of stored entries.
    fn entry_count(&self) -> u64;
}

/// Per-entry TTL policy: each entry expires `entry.ttl` after creation.
struct PerEntryExpiry;

impl Expiry<CacheKey, CacheEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory [`CacheStore`] backed by moka.
///
/// Bounded LRU with per-entry TTL enforcement; reads double-check the
/// entry's own deadline so an entry moka has not yet evicted is still
/// treated as absent.
pub struct MokaStore {
    entries: Cache<CacheKey, CacheEntry>,
}

impl MokaStore {
    /// Create a store bounded to `max_entries`.
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryExpiry)
                .build(),
        }
    }

    /// Flush pending internal maintenance so `entry_count` is exact.
    /// Test helper; correctness never depends on it.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        match self.entries.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.entries.invalidate(key).await;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn insert(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        self.entries.insert(key, entry).await;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }

    fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatRequest, Message};

    fn key(text: &str) -> CacheKey {
        CacheKey::of(&ChatRequest::new("m", vec![Message::user(text)]))
    }

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(ChatResponse::new("m", "cached"), ttl)
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = MokaStore::new(100);
        let k = key("hello");
        store.insert(k, entry(Duration::from_secs(60))).await.unwrap();

        let got = store.get(&k).await.unwrap().expect("entry present");
        assert_eq!(got.value.content, "cached");
        assert_eq!(got.level, CacheLevel::Exact);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = MokaStore::new(100);
        let k = key("hello");
        store.insert(k, entry(Duration::from_millis(20))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_the_entry() {
        let store = MokaStore::new(100);
        let k = key("hello");
        store.insert(k, entry(Duration::from_secs(60))).await.unwrap();
        store.remove(&k).await.unwrap();
        assert!(store.get(&k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn contains_respects_expiry() {
        let store = MokaStore::new(100);
        let k = key("hello");
        store.insert(k, entry(Duration::from_millis(20))).await.unwrap();
        assert!(store.contains(&k).await.unwrap());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!store.contains(&k).await.unwrap());
    }

    #[test]
    fn entry_carries_its_own_deadline() {
        let fresh = entry(Duration::from_secs(60));
        assert!(!fresh.is_expired());
        let stale = entry(Duration::ZERO);
        assert!(stale.is_expired());
    }
}
