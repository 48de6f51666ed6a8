//! Provider contract.
//!
//! The pipeline needs exactly two things from an upstream provider: its
//! name (for diagnostics and error tagging) and an async call taking the
//! canonical request to a canonical response. Wire-format translation
//! beyond that lives inside each adapter.

use async_trait::async_trait;

use crate::types::{ChatRequest, ChatResponse};
use crate::Result;

/// A handle on one upstream chat-completion provider.
///
/// Errors should be [`GrimnirError::Upstream`](crate::GrimnirError::Upstream)
/// with `transient` set for timeouts, transport failures, and 5xx
/// responses — that classification drives the dispatch retry policy.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging and error tagging.
    fn name(&self) -> &str;

    /// Execute one chat completion upstream.
    async fn call(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
