//! Per-identity sliding-window admission control.
//!
//! Fixed-size window per identity: the first admission opens a window,
//! subsequent admissions count against it, and an expired window resets
//! on the next observation. Stale windows are reclaimed lazily — a fresh
//! lookup recreates state identically, so reclamation never affects
//! correctness.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::telemetry;
use crate::types::Identity;

/// Configuration for the rate limiter.
///
/// Defaults: 10 admissions per 60-second window.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admissions per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum admissions per window.
    pub fn max_requests(mut self, n: u32) -> Self {
        self.max_requests = n;
        self
    }

    /// Set the window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

/// Result of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Per-identity window state.
#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Window-map size above which a sweep of expired windows runs.
const GC_WATERMARK: usize = 1024;

/// Sliding-window rate limiter keyed by identity.
///
/// Thread-safe; admission is a single short critical section.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<Identity, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to admit one request for `identity`.
    pub fn admit(&self, identity: &Identity) -> Admission {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("limiter lock poisoned");

        if windows.len() >= GC_WATERMARK {
            let window = self.config.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let window = windows.entry(identity.clone()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.config.max_requests {
            let retry_after = self
                .config
                .window
                .saturating_sub(now.duration_since(window.started));
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL,
                "owner" => identity.owner().to_owned(),
            )
            .increment(1);
            return Admission::Rejected { retry_after };
        }

        window.count += 1;
        Admission::Allowed
    }

    /// Number of identities currently tracked (expired windows included
    /// until the next sweep).
    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().expect("limiter lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(RateLimitConfig::new().max_requests(3));
        let id = Identity::new("caller");

        for _ in 0..3 {
            assert!(limiter.admit(&id).is_allowed());
        }
        assert!(matches!(
            limiter.admit(&id),
            Admission::Rejected { .. }
        ));
    }

    #[test]
    fn rejection_carries_bounded_retry_after() {
        let config = RateLimitConfig::new()
            .max_requests(1)
            .window(Duration::from_secs(60));
        let limiter = RateLimiter::new(config);
        let id = Identity::new("caller");

        assert!(limiter.admit(&id).is_allowed());
        match limiter.admit(&id) {
            Admission::Rejected { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(50));
            }
            Admission::Allowed => panic!("expected rejection"),
        }
    }

    #[test]
    fn window_resets_after_elapsing() {
        let config = RateLimitConfig::new()
            .max_requests(1)
            .window(Duration::from_millis(50));
        let limiter = RateLimiter::new(config);
        let id = Identity::new("caller");

        assert!(limiter.admit(&id).is_allowed());
        assert!(!limiter.admit(&id).is_allowed());

        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.admit(&id).is_allowed());
    }

    #[test]
    fn identities_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::new().max_requests(1));
        assert!(limiter.admit(&Identity::new("a")).is_allowed());
        assert!(limiter.admit(&Identity::new("b")).is_allowed());
        assert!(!limiter.admit(&Identity::new("a")).is_allowed());
    }

    #[test]
    fn stale_windows_are_swept_at_watermark() {
        let config = RateLimitConfig::new()
            .max_requests(1)
            .window(Duration::from_millis(10));
        let limiter = RateLimiter::new(config);

        for i in 0..GC_WATERMARK {
            limiter.admit(&Identity::new(format!("caller-{i}")));
        }
        assert_eq!(limiter.tracked_identities(), GC_WATERMARK);

        std::thread::sleep(Duration::from_millis(30));
        limiter.admit(&Identity::new("fresh"));
        assert_eq!(limiter.tracked_identities(), 1);
    }
}
