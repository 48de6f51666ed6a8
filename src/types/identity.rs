//! Authenticated caller identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque token representing an authenticated caller.
///
/// Produced by an [`Authenticator`](crate::auth::Authenticator) from raw
/// credential material; the pipeline, rate limiter, and usage accounting
/// only ever see this — never a plaintext key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Wrap an owner label (e.g. the key owner's name) as an identity.
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    /// The owner label, used for metrics and logging.
    pub fn owner(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
