//! Caching subsystem.
//!
//! Two cache levels behind one [`ResponseCache`] facade:
//!
//! - [`exact`] — hash-keyed exact match over a canonical [`CacheKey`],
//!   backed by an injectable [`CacheStore`] (moka-based default) with
//!   per-entry TTL.
//! - [`semantic`] — approximate match: nearest-neighbor search over
//!   request embeddings, holding only key back-references into the exact
//!   store.
//!
//! The facade also owns the [`singleflight`] table guaranteeing at most
//! one concurrent upstream dispatch per key.
//!
//! # Failure semantics
//!
//! A store error never fails a request. The affected lookup reports
//! itself degraded, the pipeline runs pass-through for that request
//! (single-flight included — duplicate upstream calls are the accepted
//! cost over blocking traffic), and a counter records the event.

pub mod exact;
pub mod key;
pub mod semantic;
pub mod singleflight;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

pub use exact::{CacheEntry, CacheLevel, CacheStore, MokaStore};
pub use key::CacheKey;
pub use semantic::{SemanticIndex, SemanticMatch, SemanticRecord};
pub use singleflight::{FlightGuard, FlightState, FlightTable, FlightWaiter, Reservation};

use crate::embed::Embedder;
use crate::telemetry;
use crate::types::{ChatRequest, ChatResponse};
use crate::Result;

/// Configuration for the response cache.
///
/// ```rust
/// # use grimnir::cache::CacheSettings;
/// # use std::time::Duration;
/// let settings = CacheSettings::new()
///     .max_entries(50_000)
///     .response_ttl(Duration::from_secs(1800))
///     .semantic_threshold(0.97);
/// ```
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Maximum number of exact-cache entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live applied to written entries. Default: 1 hour.
    pub response_ttl: Duration,
    /// Minimum cosine similarity for a semantic hit. Default: 0.95.
    pub semantic_threshold: f32,
    /// Deadline for one backend store operation; a store that blows it
    /// is treated as unavailable. Default: 2s.
    pub store_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            response_ttl: Duration::from_secs(3600),
            semantic_threshold: 0.95,
            store_timeout: Duration::from_secs(2),
        }
    }
}

impl CacheSettings {
    /// Create settings with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of exact-cache entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the TTL applied to written entries.
    pub fn response_ttl(mut self, ttl: Duration) -> Self {
        self.response_ttl = ttl;
        self
    }

    /// Set the semantic similarity threshold.
    pub fn semantic_threshold(mut self, threshold: f32) -> Self {
        self.semantic_threshold = threshold;
        self
    }

    /// Set the backend store operation deadline.
    pub fn store_timeout(mut self, deadline: Duration) -> Self {
        self.store_timeout = deadline;
        self
    }
}

/// Outcome of a cache consultation.
#[derive(Debug)]
pub enum CacheDecision {
    /// A usable entry was found. `similarity` is set for semantic hits.
    Hit {
        entry: CacheEntry,
        similarity: Option<f32>,
    },
    /// No usable entry. `embedding` carries the query vector computed
    /// during the semantic scan so a later write need not recompute it;
    /// `degraded` marks backend unavailability (pass-through mode).
    Miss {
        embedding: Option<Vec<f32>>,
        degraded: bool,
    },
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub exact_entries: u64,
    pub semantic_entries: usize,
    pub semantic_threshold: f32,
}

/// Two-level response cache with single-flight dispatch de-duplication.
pub struct ResponseCache {
    settings: CacheSettings,
    store: Arc<dyn CacheStore>,
    semantic: SemanticIndex,
    flights: Arc<FlightTable>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl ResponseCache {
    /// Create a cache over an injected store.
    ///
    /// Without an embedder the semantic level is disabled and lookups
    /// stop at the exact level.
    pub fn new(
        settings: CacheSettings,
        store: Arc<dyn CacheStore>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            settings,
            store,
            semantic: SemanticIndex::new(),
            flights: Arc::new(FlightTable::new()),
            embedder,
        }
    }

    /// Create a cache over the default in-memory store.
    pub fn in_memory(settings: CacheSettings, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let store = Arc::new(MokaStore::new(settings.max_entries));
        Self::new(settings, store, embedder)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Consult both levels for `request`.
    ///
    /// Exact first; on exact miss the request text is embedded and the
    /// semantic index scanned. A semantic candidate only counts once its
    /// key still resolves in the exact store — a dangling record is
    /// removed and the scan result discarded.
    pub async fn lookup(&self, request: &ChatRequest) -> CacheDecision {
        let key = CacheKey::of(request);

        match self.store_get(&key).await {
            Ok(Some(entry)) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "level" => CacheLevel::Exact.as_str())
                    .increment(1);
                return CacheDecision::Hit {
                    entry,
                    similarity: None,
                };
            }
            Ok(None) => {}
            Err(e) => return self.degrade("lookup", e),
        }

        let Some(embedder) = &self.embedder else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return CacheDecision::Miss {
                embedding: None,
                degraded: false,
            };
        };

        let embedding = match embedder.embed(&request.embedding_text()).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(embedder = embedder.name(), error = %e, "embedding failed, skipping semantic level");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                return CacheDecision::Miss {
                    embedding: None,
                    degraded: false,
                };
            }
        };

        if let Some(found) = self
            .semantic
            .nearest(&embedding, self.settings.semantic_threshold)
        {
            match self.store_get(&found.key).await {
                Ok(Some(entry)) => {
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "level" => CacheLevel::Semantic.as_str())
                        .increment(1);
                    return CacheDecision::Hit {
                        entry: entry.with_level(CacheLevel::Semantic),
                        similarity: Some(found.similarity),
                    };
                }
                Ok(None) => {
                    // Dangling back-reference; the exact entry is gone.
                    self.semantic.remove_key(&found.key);
                }
                Err(e) => return self.degrade("lookup", e),
            }
        }

        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        CacheDecision::Miss {
            embedding: Some(embedding),
            degraded: false,
        }
    }

    /// Register interest in dispatching `key`, or join the flight
    /// already under way.
    pub fn reserve(&self, key: CacheKey) -> Reservation {
        self.flights.reserve(key)
    }

    /// Write a settled response to both levels and release the
    /// single-flight registration for `key`, waking waiters.
    ///
    /// Waiters are notified even when the store write fails — the
    /// upstream result is valid regardless of cache health. The write
    /// error is returned so the caller can flag degradation.
    pub async fn put(
        &self,
        key: CacheKey,
        embedding: Option<Vec<f32>>,
        value: ChatResponse,
    ) -> Result<()> {
        let entry = CacheEntry::new(value, self.settings.response_ttl);
        let stored = self.store_insert(key, entry.clone()).await;

        if stored.is_ok() {
            if let Some(embedding) = embedding {
                self.semantic.insert(SemanticRecord::new(
                    embedding,
                    key,
                    self.settings.response_ttl,
                ));
            }
        }

        self.flights.complete(&key, entry);

        if let Err(e) = stored {
            warn!(error = %e, "cache write failed");
            metrics::counter!(telemetry::CACHE_DEGRADED_TOTAL).increment(1);
            return Err(e);
        }
        Ok(())
    }

    /// Remove the exact entry for `key`.
    ///
    /// The semantic record referencing it becomes dangling and is
    /// filtered out on its next scan; correctness only needs the
    /// post-lookup existence check.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.store.remove(key).await
    }

    /// Remove everything from both levels.
    pub async fn clear(&self) -> Result<()> {
        self.semantic.clear();
        self.store.clear().await
    }

    /// Point-in-time statistics (exact count is approximate).
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            exact_entries: self.store.entry_count(),
            semantic_entries: self.semantic.len(),
            semantic_threshold: self.settings.semantic_threshold,
        }
    }

    /// Backend read under the store deadline; overrunning it counts as
    /// unavailability.
    async fn store_get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        match tokio::time::timeout(self.settings.store_timeout, self.store.get(key)).await {
            Ok(result) => result,
            Err(_) => Err(crate::GrimnirError::CacheBackend("store timed out".into())),
        }
    }

    /// Backend write under the store deadline.
    async fn store_insert(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        match tokio::time::timeout(self.settings.store_timeout, self.store.insert(key, entry))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(crate::GrimnirError::CacheBackend("store timed out".into())),
        }
    }

    fn degrade(&self, operation: &'static str, error: crate::GrimnirError) -> CacheDecision {
        warn!(operation, error = %error, "cache backend unavailable, passing through");
        metrics::counter!(telemetry::CACHE_DEGRADED_TOTAL).increment(1);
        CacheDecision::Miss {
            embedding: None,
            degraded: true,
        }
    }
}
