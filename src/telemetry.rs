//! Telemetry metric name constants.
//!
//! Centralised metric names for grimnir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `grimnir_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `owner` — identity of the caller (API-key owner)
//! - `model` — requested model string
//! - `outcome` — pipeline outcome: "ok" or an error code
//! - `level` — cache level: "exact" or "semantic"
//! - `direction` — token direction: "prompt" or "completion"

/// Total requests processed by the pipeline.
///
/// Labels: `owner`, `model`, `outcome`.
pub const REQUESTS_TOTAL: &str = "grimnir_requests_total";

/// Request duration in seconds, measured across the whole pipeline.
///
/// Labels: `owner`, `model`.
pub const REQUEST_DURATION_SECONDS: &str = "grimnir_request_duration_seconds";

/// Total cache hits.
///
/// Labels: `level` ("exact" | "semantic").
pub const CACHE_HITS_TOTAL: &str = "grimnir_cache_hits_total";

/// Total cache misses (neither level matched).
pub const CACHE_MISSES_TOTAL: &str = "grimnir_cache_misses_total";

/// Total requests served from a shared in-flight dispatch rather than
/// a fresh upstream call.
pub const COALESCED_TOTAL: &str = "grimnir_coalesced_total";

/// Total requests that found the cache backend unavailable and ran in
/// pass-through mode.
pub const CACHE_DEGRADED_TOTAL: &str = "grimnir_cache_degraded_total";

/// Total admissions rejected by the rate limiter.
///
/// Labels: `owner`.
pub const RATE_LIMITED_TOTAL: &str = "grimnir_rate_limited_total";

/// Total dispatch retry attempts (not counting the initial request).
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "grimnir_retries_total";

/// Total tokens consumed, as reported by upstream usage accounting.
///
/// Labels: `owner`, `model`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "grimnir_tokens_total";

/// Total requests where the scrub engine failed and original text was
/// passed through unmodified.
pub const SCRUB_FALLBACK_TOTAL: &str = "grimnir_scrub_fallback_total";
