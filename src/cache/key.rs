//! Cache-key canonicalization.
//!
//! A [`CacheKey`] is a SHA-256 digest over the request fields that can
//! affect model output: model, messages (order-preserving), temperature,
//! max_tokens, top_p, n, and stop sequences. Nothing else participates,
//! so requests differing only in pass-through fields (`stream`, `user`)
//! collide by construction.
//!
//! Canonicalization rules:
//! - message content has whitespace runs collapsed to single spaces and
//!   ends trimmed;
//! - absent temperature/top_p/n normalize to their documented defaults
//!   (1.0 / 1.0 / 1), so explicit-default and absent hash identically;
//! - absent max_tokens and stop hash as explicit absence markers;
//! - fields are delimited with control separators so adjacent values
//!   cannot run together.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::types::ChatRequest;

/// Field separator fed between canonical values.
const SEP: &[u8] = &[0x1f];
/// Record separator fed between messages.
const RECORD: &[u8] = &[0x1e];

/// Deterministic digest identifying a request for exact-cache purposes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Compute the key for a request.
    pub fn of(request: &ChatRequest) -> Self {
        let mut hasher = Sha256::new();

        hasher.update(request.model.as_bytes());
        hasher.update(SEP);

        for message in &request.messages {
            hasher.update(message.role.as_str().as_bytes());
            hasher.update(SEP);
            hasher.update(normalize_whitespace(&message.content).as_bytes());
            hasher.update(RECORD);
        }

        hasher.update(format_float(request.temperature.unwrap_or(1.0)).as_bytes());
        hasher.update(SEP);
        hasher.update(format_float(request.top_p.unwrap_or(1.0)).as_bytes());
        hasher.update(SEP);
        hasher.update(request.n.unwrap_or(1).to_string().as_bytes());
        hasher.update(SEP);
        match request.max_tokens {
            Some(max) => hasher.update(max.to_string().as_bytes()),
            None => hasher.update(b"-"),
        }
        hasher.update(SEP);
        for stop in request.stop.as_deref().unwrap_or_default() {
            hasher.update(stop.as_bytes());
            hasher.update(RECORD);
        }

        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        use std::fmt::Write as _;
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stable shortest-form float rendering (via the standard formatter).
fn format_float(value: f32) -> String {
    format!("{value}")
}
