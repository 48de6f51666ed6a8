//! Builder for configuring gateway instances

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::cache::{CacheSettings, CacheStore, MokaStore, ResponseCache};
use crate::config::GatewayConfig;
use crate::embed::Embedder;
use crate::limiter::{RateLimitConfig, RateLimiter};
use crate::providers::{
    ChatProvider, OpenAiCompatProvider, ProviderRegistration, ProviderRouter, RoutingTable,
};
use crate::scrub::{PatternScrubber, PiiScrubber};
use crate::{GrimnirError, Result};

use super::pipeline::{DispatchPolicy, Gateway, StageTimeouts};

/// Main entry point for creating gateway instances.
pub struct Grimnir;

impl Grimnir {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GrimnirBuilder {
        GrimnirBuilder::new()
    }
}

/// Builder for configuring gateway instances.
pub struct GrimnirBuilder {
    registrations: Vec<ProviderRegistration>,
    scrubber: Option<Arc<dyn PiiScrubber>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Option<Arc<dyn CacheStore>>,
    cache_settings: CacheSettings,
    rate_limit: RateLimitConfig,
    timeouts: StageTimeouts,
    dispatch_policy: DispatchPolicy,
}

impl GrimnirBuilder {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            scrubber: None,
            authenticator: None,
            embedder: None,
            store: None,
            cache_settings: CacheSettings::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: StageTimeouts::default(),
            dispatch_policy: DispatchPolicy::default(),
        }
    }

    /// Register a provider handle for the models it serves.
    ///
    /// Registration order is irrelevant: every model maps to exactly one
    /// provider, and duplicates fail at [`build()`](Self::build).
    pub fn provider(
        mut self,
        provider: Arc<dyn ChatProvider>,
        models: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.registrations
            .push(ProviderRegistration::new(provider, models));
        self
    }

    /// Register an OpenAI-compatible endpoint for the given models.
    pub fn openai_compatible(
        self,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let provider = Arc::new(OpenAiCompatProvider::new(name, base_url, api_key));
        self.provider(provider, models)
    }

    /// Set the PII scrub engine (default: [`PatternScrubber`]).
    pub fn scrubber(mut self, scrubber: Arc<dyn PiiScrubber>) -> Self {
        self.scrubber = Some(scrubber);
        self
    }

    /// Set the authenticator backing [`Gateway::authenticate`].
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Set the embedding function. Without one, the semantic cache level
    /// is disabled and lookups stop at the exact level.
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Inject a cache store (default: in-memory moka store).
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set cache sizing, TTL, and semantic threshold.
    pub fn cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache_settings = settings;
        self
    }

    /// Set the admission-control window.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Set per-stage deadlines.
    pub fn timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the dispatch retry policy.
    pub fn dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    /// Apply a loaded configuration: limiter, cache, timeouts, and one
    /// OpenAI-compatible provider per config entry (API keys resolved
    /// from the named environment variables).
    pub fn with_config(mut self, config: &GatewayConfig) -> Result<Self> {
        self.rate_limit = config.rate_limit();
        self.cache_settings = config.cache_settings();
        self.timeouts = config.stage_timeouts();

        for entry in &config.providers {
            let api_key = std::env::var(&entry.api_key_env).map_err(|_| {
                GrimnirError::Configuration(format!(
                    "environment variable {} not set for provider '{}'",
                    entry.api_key_env, entry.name,
                ))
            })?;
            self = self.openai_compatible(
                entry.name.clone(),
                entry.base_url.clone(),
                api_key,
                entry.models.iter().cloned(),
            );
        }
        Ok(self)
    }

    /// Build the gateway.
    pub fn build(self) -> Result<Gateway> {
        if self.registrations.is_empty() {
            return Err(GrimnirError::Configuration(
                "no providers registered".into(),
            ));
        }

        let table = RoutingTable::build(self.registrations)?;
        let router = Arc::new(ProviderRouter::new(table));

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MokaStore::new(self.cache_settings.max_entries)));
        let cache = Arc::new(ResponseCache::new(
            self.cache_settings,
            store,
            self.embedder,
        ));

        let scrubber = self
            .scrubber
            .unwrap_or_else(|| Arc::new(PatternScrubber::new()));

        Ok(Gateway::new(
            scrubber,
            self.authenticator,
            RateLimiter::new(self.rate_limit),
            cache,
            router,
            self.timeouts,
            self.dispatch_policy,
        ))
    }
}

impl Default for GrimnirBuilder {
    fn default() -> Self {
        Self::new()
    }
}
