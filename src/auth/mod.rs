//! Caller authentication.
//!
//! The pipeline consumes an [`Identity`] produced by an
//! [`Authenticator`]; raw key material never crosses into the pipeline,
//! the cache, or any log line. Keys are compared by SHA-256 digest.

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::types::Identity;
use crate::{GrimnirError, Result};

/// Contract for validating raw API keys into identities.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate a raw key. Implementations must not persist or log it.
    async fn validate(&self, raw_key: &str) -> Result<Identity>;
}

/// Hash an API key for storage or lookup.
pub fn hash_api_key(raw_key: &str) -> String {
    let digest = Sha256::digest(raw_key.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Generate a new `sk-`-prefixed API key from 32 random bytes.
pub fn generate_api_key() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| GrimnirError::Internal(format!("random source unavailable: {e}")))?;
    let mut key = String::with_capacity(67);
    key.push_str("sk-");
    for byte in bytes {
        let _ = write!(key, "{byte:02x}");
    }
    Ok(key)
}

/// In-memory authenticator over a fixed set of hashed keys.
///
/// Raw keys given to [`add_key`](Self::add_key) are hashed immediately
/// and discarded; only digests are retained. Key records live elsewhere
/// (a database, a secrets file) — this type is the narrow validation
/// seam the pipeline needs.
#[derive(Debug, Default)]
pub struct StaticKeyAuthenticator {
    keys: HashMap<String, Identity>,
}

impl StaticKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw key for `identity`. The raw key is hashed and dropped.
    pub fn add_key(&mut self, raw_key: &str, identity: Identity) {
        self.keys.insert(hash_api_key(raw_key), identity);
    }

    /// Register a pre-hashed key (hex SHA-256) for `identity`.
    pub fn add_key_hash(&mut self, key_hash: impl Into<String>, identity: Identity) {
        self.keys.insert(key_hash.into(), identity);
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl Authenticator for StaticKeyAuthenticator {
    async fn validate(&self, raw_key: &str) -> Result<Identity> {
        self.keys
            .get(&hash_api_key(raw_key))
            .cloned()
            .ok_or(GrimnirError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_hex() {
        let a = hash_api_key("sk-test");
        let b = hash_api_key("sk-test");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_keys_are_prefixed_and_distinct() {
        let a = generate_api_key().unwrap();
        let b = generate_api_key().unwrap();
        assert!(a.starts_with("sk-"));
        assert_eq!(a.len(), 67);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn validate_known_key() {
        let mut auth = StaticKeyAuthenticator::new();
        auth.add_key("sk-alpha", Identity::new("alice"));

        let identity = auth.validate("sk-alpha").await.unwrap();
        assert_eq!(identity.owner(), "alice");
    }

    #[tokio::test]
    async fn validate_unknown_key_fails() {
        let auth = StaticKeyAuthenticator::new();
        let result = auth.validate("sk-nope").await;
        assert!(matches!(result, Err(GrimnirError::AuthenticationFailed)));
    }
}
