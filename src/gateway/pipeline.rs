//! The request-processing pipeline.
//!
//! Each request walks a linear state machine with no backtracking:
//!
//! ```text
//! RECEIVED → ANONYMIZED → ADMITTED → CACHE_CHECKED → DISPATCHED → COMPLETED
//! ```
//!
//! with a typed abort reachable from any state. Anonymization runs before
//! any cache-key or embedding computation, so unscrubbed content never
//! reaches the cache or a provider. Cache writes happen only after a
//! confirmed upstream success, never speculatively.
//!
//! Upstream dispatch runs on a detached task owned by the single-flight
//! leader: a client disconnecting mid-request does not cancel a dispatch
//! other waiters are sharing, and a dispatch nobody is waiting on is
//! abandoned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::auth::Authenticator;
use crate::cache::{CacheDecision, CacheKey, CacheLevel, FlightState, Reservation, ResponseCache};
use crate::limiter::{Admission, RateLimiter};
use crate::providers::{ChatProvider, ProviderRegistration, ProviderRouter, RoutingTable};
use crate::scrub::{PiiCategory, PiiScrubber};
use crate::telemetry;
use crate::types::{ChatRequest, ChatResponse, Identity, Usage};
use crate::{GrimnirError, Result};

/// Independent deadlines for the stages that perform I/O.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    /// Deadline per message for the scrub engine. Default: 5s.
    pub scrub: Duration,
    /// Deadline for one upstream provider call. Default: 120s.
    pub dispatch: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            scrub: Duration::from_secs(5),
            dispatch: Duration::from_secs(120),
        }
    }
}

impl StageTimeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scrub(mut self, deadline: Duration) -> Self {
        self.scrub = deadline;
        self
    }

    pub fn dispatch(mut self, deadline: Duration) -> Self {
        self.dispatch = deadline;
        self
    }
}

/// Retry policy for the dispatch stage: at most one retry, fixed backoff,
/// transient errors only.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Whether transient upstream errors get their one retry. Default: true.
    pub retry_transient: bool,
    /// Fixed delay before the retry. Default: 250ms.
    pub backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            retry_transient: true,
            backoff: Duration::from_millis(250),
        }
    }
}

/// How the cache participated in serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the exact level; no upstream call.
    Exact,
    /// Served from the semantic level; no upstream call.
    Semantic,
    /// Served from another request's in-flight dispatch.
    Coalesced,
    /// This request dispatched upstream and populated the cache.
    Miss,
    /// Cache backend unavailable; dispatched in pass-through mode.
    Degraded,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Exact => "exact",
            CacheStatus::Semantic => "semantic",
            CacheStatus::Coalesced => "coalesced",
            CacheStatus::Miss => "miss",
            CacheStatus::Degraded => "degraded",
        }
    }

    /// Whether the request was answered without its own upstream call.
    pub fn is_hit(&self) -> bool {
        matches!(
            self,
            CacheStatus::Exact | CacheStatus::Semantic | CacheStatus::Coalesced
        )
    }
}

/// A completed pipeline pass.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub response: ChatResponse,
    pub cache: CacheStatus,
    /// Set when the scrub engine failed and original text passed through.
    pub scrub_fallback: bool,
    /// PII categories that were replaced, deduplicated.
    pub scrubbed: Vec<PiiCategory>,
}

/// The gateway: pipeline orchestrator over scrubber, limiter, cache,
/// and provider routing.
pub struct Gateway {
    scrubber: Arc<dyn PiiScrubber>,
    authenticator: Option<Arc<dyn Authenticator>>,
    limiter: RateLimiter,
    cache: Arc<ResponseCache>,
    router: Arc<ProviderRouter>,
    timeouts: StageTimeouts,
    dispatch_policy: DispatchPolicy,
}

impl Gateway {
    pub(crate) fn new(
        scrubber: Arc<dyn PiiScrubber>,
        authenticator: Option<Arc<dyn Authenticator>>,
        limiter: RateLimiter,
        cache: Arc<ResponseCache>,
        router: Arc<ProviderRouter>,
        timeouts: StageTimeouts,
        dispatch_policy: DispatchPolicy,
    ) -> Self {
        Self {
            scrubber,
            authenticator,
            limiter,
            cache,
            router,
            timeouts,
            dispatch_policy,
        }
    }

    /// Validate a raw API key into an identity.
    pub async fn authenticate(&self, raw_key: &str) -> Result<Identity> {
        match &self.authenticator {
            Some(authenticator) => authenticator.validate(raw_key).await,
            None => Err(GrimnirError::AuthenticationFailed),
        }
    }

    /// Authenticate, then process.
    pub async fn process_with_key(
        &self,
        raw_key: &str,
        request: ChatRequest,
    ) -> Result<PipelineOutcome> {
        let identity = self.authenticate(raw_key).await?;
        self.process(request, &identity).await
    }

    /// Run one request through the pipeline.
    #[instrument(skip(self, request), fields(model = %request.model, owner = %identity.owner()))]
    pub async fn process(
        &self,
        request: ChatRequest,
        identity: &Identity,
    ) -> Result<PipelineOutcome> {
        let started = Instant::now();
        let owner = identity.owner().to_owned();
        let model = request.model.clone();

        let result = self.run(request, identity).await;

        let outcome_label = match &result {
            Ok(_) => "ok",
            Err(e) => e.code(),
        };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "owner" => owner.clone(),
            "model" => model.clone(),
            "outcome" => outcome_label,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "owner" => owner.clone(),
            "model" => model.clone(),
        )
        .record(started.elapsed().as_secs_f64());

        if let Ok(outcome) = &result {
            // Tokens are accounted only when this request actually
            // consumed upstream capacity; hits and coalesced waiters
            // reuse tokens already counted by the dispatching request.
            if !outcome.cache.is_hit() {
                if let Some(usage) = &outcome.response.usage {
                    record_token_usage(&owner, &model, usage);
                }
            }
        }

        result
    }

    async fn run(&self, request: ChatRequest, identity: &Identity) -> Result<PipelineOutcome> {
        // RECEIVED: structural validation, before admission or any
        // cache/provider contact.
        request.validate()?;

        // ANONYMIZED
        let (request, scrubbed, scrub_fallback) = self.anonymize(request).await;

        // ADMITTED
        match self.limiter.admit(identity) {
            Admission::Allowed => {}
            Admission::Rejected { retry_after } => {
                return Err(GrimnirError::RateLimited { retry_after });
            }
        }

        // CACHE_CHECKED
        let key = CacheKey::of(&request);
        let (embedding, degraded) = match self.cache.lookup(&request).await {
            CacheDecision::Hit { entry, similarity } => {
                let status = match entry.level {
                    CacheLevel::Exact => CacheStatus::Exact,
                    CacheLevel::Semantic => CacheStatus::Semantic,
                };
                if let Some(similarity) = similarity {
                    tracing::debug!(similarity, "semantic cache hit");
                }
                return Ok(self.complete(entry.value, &request, status, scrubbed, scrub_fallback));
            }
            CacheDecision::Miss {
                embedding,
                degraded,
            } => (embedding, degraded),
        };

        // DISPATCHED: resolve against the snapshot captured now; a
        // concurrent reload does not affect this request.
        let provider = self.router.snapshot().resolve(&request.model)?;

        if degraded {
            // Pass-through mode: no single-flight, duplicate upstream
            // calls accepted over blocking traffic.
            let response = self.dispatch_direct(&provider, &request).await?;
            // Write errors are already counted and logged by the cache.
            let _ = self.cache.put(key, None, response.clone()).await;
            return Ok(self.complete(
                response,
                &request,
                CacheStatus::Degraded,
                scrubbed,
                scrub_fallback,
            ));
        }

        loop {
            match self.cache.reserve(key) {
                Reservation::Leader { guard, waiter } => {
                    // Keep our waiter alive while the detached dispatch
                    // runs: dropping it with no followers present would
                    // signal abandonment.
                    let _waiter = waiter;
                    let handle =
                        self.spawn_dispatch(guard, provider.clone(), request.clone(), embedding.clone());
                    let response = match handle.await {
                        Ok(result) => result?,
                        Err(e) => return Err(GrimnirError::Internal(format!("dispatch task: {e}"))),
                    };
                    return Ok(self.complete(
                        response,
                        &request,
                        CacheStatus::Miss,
                        scrubbed,
                        scrub_fallback,
                    ));
                }
                Reservation::Follower(waiter) => match waiter.outcome().await {
                    FlightState::Done(entry) => {
                        metrics::counter!(telemetry::COALESCED_TOTAL).increment(1);
                        return Ok(self.complete(
                            entry.value,
                            &request,
                            CacheStatus::Coalesced,
                            scrubbed,
                            scrub_fallback,
                        ));
                    }
                    // The shared dispatch failed; failures are not
                    // cached, so retry our own dispatch by re-reserving.
                    FlightState::Failed | FlightState::Pending => continue,
                },
            }
        }
    }

    /// COMPLETED: echo the originally requested model string and attach
    /// the observability flags.
    fn complete(
        &self,
        mut response: ChatResponse,
        request: &ChatRequest,
        cache: CacheStatus,
        scrubbed: Vec<PiiCategory>,
        scrub_fallback: bool,
    ) -> PipelineOutcome {
        response.model = request.model.clone();
        PipelineOutcome {
            response,
            cache,
            scrub_fallback,
            scrubbed,
        }
    }

    /// Scrub every message, treating engine failure as non-fatal: the
    /// original text passes through and the fallback flag is raised for
    /// operators to alert on.
    async fn anonymize(&self, mut request: ChatRequest) -> (ChatRequest, Vec<PiiCategory>, bool) {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();
        let mut fallback = false;

        for message in &mut request.messages {
            match tokio::time::timeout(self.timeouts.scrub, self.scrubber.scrub(&message.content))
                .await
            {
                Ok(Ok(outcome)) => {
                    message.content = outcome.text;
                    for category in outcome.categories {
                        if seen.insert(category) {
                            categories.push(category);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(engine = self.scrubber.name(), error = %e, "scrub engine failed, passing original text through");
                    fallback = true;
                }
                Err(_) => {
                    warn!(engine = self.scrubber.name(), "scrub engine timed out, passing original text through");
                    fallback = true;
                }
            }
        }

        if fallback {
            metrics::counter!(telemetry::SCRUB_FALLBACK_TOTAL).increment(1);
        }
        (request, categories, fallback)
    }

    /// Launch the upstream call on a detached task so it survives this
    /// request's cancellation for as long as any waiter remains.
    fn spawn_dispatch(
        &self,
        guard: crate::cache::FlightGuard,
        provider: Arc<dyn ChatProvider>,
        request: ChatRequest,
        embedding: Option<Vec<f32>>,
    ) -> JoinHandle<Result<ChatResponse>> {
        let cache = Arc::clone(&self.cache);
        let policy = self.dispatch_policy.clone();
        let deadline = self.timeouts.dispatch;
        let key = *guard.key();

        tokio::spawn(async move {
            let result = tokio::select! {
                result = dispatch_with_retry(&*provider, &request, &policy, deadline) => result,
                _ = guard.abandoned() => Err(GrimnirError::Internal(
                    "dispatch abandoned: no waiters remain".into(),
                )),
            };

            match result {
                Ok(response) => {
                    // Write-back is the post-condition of success; it
                    // also releases the flight and wakes waiters. A
                    // store failure is absorbed — the response is valid
                    // regardless of cache health.
                    let _ = cache.put(key, embedding, response.clone()).await;
                    drop(guard);
                    Ok(response)
                }
                Err(e) => {
                    // Guard drop marks the flight failed; waiters retry
                    // their own dispatch. Failures are never cached.
                    drop(guard);
                    Err(e)
                }
            }
        })
    }

    async fn dispatch_direct(
        &self,
        provider: &Arc<dyn ChatProvider>,
        request: &ChatRequest,
    ) -> Result<ChatResponse> {
        dispatch_with_retry(&**provider, request, &self.dispatch_policy, self.timeouts.dispatch)
            .await
    }

    /// Access to cache maintenance.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Publish a new provider routing snapshot; in-flight requests keep
    /// the snapshot they started with.
    pub fn reload_providers(&self, registrations: Vec<ProviderRegistration>) -> Result<()> {
        self.router.reload(RoutingTable::build(registrations)?);
        Ok(())
    }
}

/// Execute one upstream call with the bounded retry policy: transient
/// failures get exactly one retry after a short fixed backoff, all other
/// errors propagate immediately.
async fn dispatch_with_retry(
    provider: &dyn ChatProvider,
    request: &ChatRequest,
    policy: &DispatchPolicy,
    deadline: Duration,
) -> Result<ChatResponse> {
    let attempts = if policy.retry_transient { 2 } else { 1 };
    let mut last_err = None;

    for attempt in 0..attempts {
        let outcome = match tokio::time::timeout(deadline, provider.call(request)).await {
            Ok(result) => result,
            Err(_) => Err(GrimnirError::StageTimeout { stage: "dispatch" }),
        };
        match outcome {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "provider" => provider.name().to_owned(),
                )
                .increment(1);
                warn!(
                    provider = provider.name(),
                    error = %e,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    "retrying after transient upstream error"
                );
                tokio::time::sleep(policy.backoff).await;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| GrimnirError::Internal("dispatch produced no outcome".into())))
}

/// Record token usage from upstream usage accounting.
fn record_token_usage(owner: &str, model: &str, usage: &Usage) {
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "owner" => owner.to_owned(),
        "model" => model.to_owned(),
        "direction" => "prompt",
    )
    .increment(u64::from(usage.prompt_tokens));
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "owner" => owner.to_owned(),
        "model" => model.to_owned(),
        "direction" => "completion",
    )
    .increment(u64::from(usage.completion_tokens));
}
