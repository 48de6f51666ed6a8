//! Grimnir - Privacy-scrubbing gateway for LLM APIs
//!
//! This crate provides the request-processing core of an
//! OpenAI-compatible gateway: every chat-completion request is PII
//! scrubbed, rate limited, checked against a two-level response cache
//! (exact hash match plus semantic similarity match), and only then
//! dispatched to the provider configured for its model. Concurrent
//! identical requests share a single upstream call.
//!
//! # Example
//!
//! ```rust,no_run
//! use grimnir::{ChatRequest, Grimnir, Identity, Message};
//!
//! #[tokio::main]
//! async fn main() -> grimnir::Result<()> {
//!     let gateway = Grimnir::builder()
//!         .openai_compatible(
//!             "openai",
//!             "https://api.openai.com/v1",
//!             std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!             ["gpt-4o", "gpt-3.5-turbo"],
//!         )
//!         .build()?;
//!
//!     let identity = Identity::new("alice");
//!     let outcome = gateway
//!         .process(
//!             ChatRequest::new("gpt-3.5-turbo", vec![Message::user("Hello!")]).max_tokens(50),
//!             &identity,
//!         )
//!         .await?;
//!
//!     println!("{} (cache: {})", outcome.response.content, outcome.cache.as_str());
//!     Ok(())
//! }
//! ```
//!
//! # Degradation posture
//!
//! Failures in the ancillary stages never take the gateway down with
//! them: a scrub-engine failure passes original text through behind an
//! observable flag, and a cache-backend failure downgrades caching to
//! pass-through for the affected requests. Only validation, admission,
//! authentication, routing, and the upstream call itself can fail a
//! request.

pub mod auth;
pub mod cache;
pub mod config;
pub mod embed;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod providers;
pub mod scrub;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{ErrorBody, GrimnirError, Result};
pub use gateway::{
    CacheStatus, DispatchPolicy, Gateway, Grimnir, GrimnirBuilder, PipelineOutcome, StageTimeouts,
};

// Re-export collaborator contracts and bundled implementations
pub use auth::{Authenticator, StaticKeyAuthenticator};
pub use cache::{CacheKey, CacheSettings, CacheStore, ResponseCache};
pub use config::GatewayConfig;
pub use embed::Embedder;
pub use limiter::{Admission, RateLimitConfig, RateLimiter};
pub use providers::{ChatProvider, OpenAiCompatProvider, ProviderRegistration};
pub use scrub::{PatternScrubber, PiiCategory, PiiScrubber, ScrubOutcome};

// Re-export all canonical types
pub use types::{ChatRequest, ChatResponse, FinishReason, Identity, Message, Role, Usage};
