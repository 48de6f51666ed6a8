//! Semantic cache level: nearest-neighbor index over request embeddings.
//!
//! The index stores only `{embedding → cache key}` back-references, never
//! response payloads. Payload lifetime belongs to the exact store; a
//! record whose key no longer resolves there is dangling and gets
//! filtered (and removed) lazily on lookup — eviction here is driven by,
//! not driving, exact-cache expiry.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::cache::key::CacheKey;
use crate::embed::cosine_similarity;

/// One embedding→key association, sharing the lifetime of its exact entry.
#[derive(Debug, Clone)]
pub struct SemanticRecord {
    pub embedding: Vec<f32>,
    pub key: CacheKey,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl SemanticRecord {
    pub fn new(embedding: Vec<f32>, key: CacheKey, ttl: Duration) -> Self {
        Self {
            embedding,
            key,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

/// A nearest-neighbor match at or above the similarity threshold.
#[derive(Debug, Clone, Copy)]
pub struct SemanticMatch {
    pub key: CacheKey,
    pub similarity: f32,
}

/// Linear-scan cosine index.
///
/// Scan cost is O(records), which holds up well at the entry counts a
/// single gateway process caches; the record shape is
/// index-structure-agnostic if an ANN index is ever warranted.
#[derive(Debug, Default)]
pub struct SemanticIndex {
    records: RwLock<Vec<SemanticRecord>>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous record for the same key.
    pub fn insert(&self, record: SemanticRecord) {
        let mut records = self.records.write().expect("semantic index lock poisoned");
        records.retain(|r| r.key != record.key);
        records.push(record);
    }

    /// Find the best non-expired neighbor at or above `threshold`.
    ///
    /// Expired records encountered during the scan are removed. Ties on
    /// similarity resolve to the most recently created record.
    pub fn nearest(&self, query: &[f32], threshold: f32) -> Option<SemanticMatch> {
        let mut records = self.records.write().expect("semantic index lock poisoned");
        records.retain(|r| !r.is_expired());

        let mut best: Option<(f32, Instant, CacheKey)> = None;
        for record in records.iter() {
            let similarity = cosine_similarity(query, &record.embedding);
            let candidate = (similarity, record.created_at, record.key);
            best = match best {
                None => Some(candidate),
                Some((s, created, _))
                    if similarity > s || (similarity == s && record.created_at > created) =>
                {
                    Some(candidate)
                }
                keep => keep,
            };
        }

        best.filter(|(similarity, _, _)| *similarity >= threshold)
            .map(|(similarity, _, key)| SemanticMatch { key, similarity })
    }

    /// Drop the record for `key`, if present.
    pub fn remove_key(&self, key: &CacheKey) {
        self.records
            .write()
            .expect("semantic index lock poisoned")
            .retain(|r| r.key != *key);
    }

    /// Drop every record.
    pub fn clear(&self) {
        self.records
            .write()
            .expect("semantic index lock poisoned")
            .clear();
    }

    /// Number of records (expired ones included until the next scan).
    pub fn len(&self) -> usize {
        self.records
            .read()
            .expect("semantic index lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
