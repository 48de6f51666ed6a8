//! Gateway configuration.
//!
//! Loaded from TOML. Every section is optional and falls back to the
//! documented defaults. Provider API keys are referenced by environment
//! variable name — secrets never live in the config model itself.
//!
//! ```toml
//! [limits]
//! max_requests = 10
//! window_secs = 60
//!
//! [cache]
//! max_entries = 10000
//! response_ttl_secs = 3600
//! semantic_threshold = 0.95
//!
//! [timeouts]
//! scrub_millis = 5000
//! dispatch_secs = 120
//!
//! [[providers]]
//! name = "openai"
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! models = ["gpt-4o", "gpt-3.5-turbo"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheSettings;
use crate::gateway::StageTimeouts;
use crate::limiter::RateLimitConfig;
use crate::{GrimnirError, Result};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    #[serde(default)]
    pub providers: Vec<ProviderSection>,
}

impl GatewayConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| GrimnirError::Configuration(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GrimnirError::Configuration(format!(
                "cannot read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new()
            .max_requests(self.limits.max_requests)
            .window(Duration::from_secs(self.limits.window_secs))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings::new()
            .max_entries(self.cache.max_entries)
            .response_ttl(Duration::from_secs(self.cache.response_ttl_secs))
            .semantic_threshold(self.cache.semantic_threshold)
    }

    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts::new()
            .scrub(Duration::from_millis(self.timeouts.scrub_millis))
            .dispatch(Duration::from_secs(self.timeouts.dispatch_secs))
    }
}

/// Admission-control limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    /// Maximum admissions per window (default: 10).
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

/// Response-cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum exact-cache entries (default: 10,000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Entry TTL in seconds (default: 3600).
    #[serde(default = "default_response_ttl_secs")]
    pub response_ttl_secs: u64,
    /// Minimum cosine similarity for a semantic hit (default: 0.95).
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            response_ttl_secs: default_response_ttl_secs(),
            semantic_threshold: default_semantic_threshold(),
        }
    }
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_response_ttl_secs() -> u64 {
    3600
}

fn default_semantic_threshold() -> f32 {
    0.95
}

/// Per-stage deadlines.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsSection {
    /// Scrub deadline per message, in milliseconds (default: 5000).
    #[serde(default = "default_scrub_millis")]
    pub scrub_millis: u64,
    /// Upstream dispatch deadline in seconds (default: 120).
    #[serde(default = "default_dispatch_secs")]
    pub dispatch_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            scrub_millis: default_scrub_millis(),
            dispatch_secs: default_dispatch_secs(),
        }
    }
}

fn default_scrub_millis() -> u64 {
    5_000
}

fn default_dispatch_secs() -> u64 {
    120
}

/// One upstream provider declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    /// Provider name for diagnostics.
    pub name: String,
    /// OpenAI-compatible base URL (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Models this provider serves.
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config.limits.max_requests, 10);
        assert_eq!(config.limits.window_secs, 60);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.cache.semantic_threshold, 0.95);
        assert_eq!(config.timeouts.dispatch_secs, 120);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [limits]
            max_requests = 20
            window_secs = 30

            [cache]
            max_entries = 500
            response_ttl_secs = 120
            semantic_threshold = 0.9

            [[providers]]
            name = "openai"
            base_url = "https://api.openai.com/v1"
            api_key_env = "OPENAI_API_KEY"
            models = ["gpt-4o", "gpt-3.5-turbo"]

            [[providers]]
            name = "local"
            base_url = "http://localhost:8080/v1"
            api_key_env = "LOCAL_API_KEY"
            models = ["llama-3.1-8b"]
            "#,
        )
        .unwrap();

        assert_eq!(config.limits.max_requests, 20);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].models, vec!["gpt-4o", "gpt-3.5-turbo"]);
        assert_eq!(config.providers[1].name, "local");
    }

    #[test]
    fn section_conversions_carry_values() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [limits]
            max_requests = 5
            window_secs = 10

            [timeouts]
            scrub_millis = 250
            dispatch_secs = 7
            "#,
        )
        .unwrap();

        let limit = config.rate_limit();
        assert_eq!(limit.max_requests, 5);
        assert_eq!(limit.window, Duration::from_secs(10));

        let timeouts = config.stage_timeouts();
        assert_eq!(timeouts.scrub, Duration::from_millis(250));
        assert_eq!(timeouts.dispatch, Duration::from_secs(7));
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let result = GatewayConfig::from_toml_str("limits = nonsense");
        assert!(matches!(result, Err(GrimnirError::Configuration(_))));
    }
}
