//! Grimnir error types

use std::time::Duration;

use serde::Serialize;

/// Grimnir error types
#[derive(Debug, thiserror::Error)]
pub enum GrimnirError {
    // Request errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Upstream errors
    /// Error returned by (or while reaching) an upstream provider.
    ///
    /// `transient` drives the dispatch retry policy: timeouts, transport
    /// failures, and 5xx responses are transient; 4xx responses and
    /// content-policy rejections are permanent.
    #[error("upstream error from {provider} ({status:?}): {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
        transient: bool,
    },

    #[error("stage timed out: {stage}")]
    StageTimeout { stage: &'static str },

    // Cache errors
    /// Cache backend failure. Never fails a request on its own — the
    /// pipeline downgrades the cache to pass-through and continues.
    #[error("cache backend error: {0}")]
    CacheBackend(String),

    // Scrubbing errors
    #[error("scrub engine error: {0}")]
    Scrub(String),

    // Embedding errors
    #[error("embedding error: {0}")]
    Embedding(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GrimnirError {
    /// Whether this error is worth retrying at the dispatch stage.
    pub fn is_transient(&self) -> bool {
        match self {
            GrimnirError::Upstream { transient, .. } => *transient,
            GrimnirError::StageTimeout { stage } => *stage == "dispatch",
            _ => false,
        }
    }

    /// Extract a retry-after hint, if the error carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GrimnirError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Stable machine-readable code for the wire-level error body.
    pub fn code(&self) -> &'static str {
        match self {
            GrimnirError::InvalidRequest(_) => "invalid_request",
            GrimnirError::RateLimited { .. } => "rate_limited",
            GrimnirError::AuthenticationFailed => "authentication_error",
            GrimnirError::ModelNotFound(_) => "model_not_found",
            GrimnirError::Upstream { .. } => "upstream_error",
            GrimnirError::StageTimeout { .. } => "timeout",
            GrimnirError::CacheBackend(_) => "cache_degraded",
            GrimnirError::Scrub(_) => "scrub_error",
            GrimnirError::Embedding(_) => "embedding_error",
            GrimnirError::Configuration(_) => "configuration_error",
            GrimnirError::Json(_) => "invalid_request",
            GrimnirError::Internal(_) => "internal_error",
        }
    }

    /// Coarse error family, OpenAI-style.
    pub fn error_type(&self) -> &'static str {
        match self {
            GrimnirError::InvalidRequest(_) | GrimnirError::Json(_) => "invalid_request_error",
            GrimnirError::RateLimited { .. } => "rate_limit_error",
            GrimnirError::AuthenticationFailed => "authentication_error",
            GrimnirError::ModelNotFound(_) => "not_found_error",
            GrimnirError::Upstream { .. } | GrimnirError::StageTimeout { .. } => "api_error",
            _ => "internal_error",
        }
    }

    /// Structured error body returned to callers.
    ///
    /// Internal failures never expose detail — only the stable code.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            GrimnirError::Internal(_) | GrimnirError::Configuration(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code(),
            message,
            error_type: self.error_type(),
        }
    }
}

/// Wire-level error payload: `{code, message, type}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
}

/// Result type alias for Grimnir operations
pub type Result<T> = std::result::Result<T, GrimnirError>;
