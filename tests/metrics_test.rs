//! Metric emission tests using a local debugging recorder.

use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use grimnir::cache::{CacheSettings, ResponseCache};
use grimnir::{ChatRequest, ChatResponse, Identity, Message, RateLimitConfig, RateLimiter};

fn counter_sum(snapshotter: &Snapshotter, name: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter && key.key().name() == name
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(c) => *c,
            _ => 0,
        })
        .sum()
}

/// Runs async cache operations within a local recorder scope.
///
/// Uses `block_in_place` + `block_on` to keep `with_local_recorder` on
/// the same thread (it installs a thread-local recorder).
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_misses_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let cache = ResponseCache::in_memory(CacheSettings::default(), None);
                let request = ChatRequest::new("m", vec![Message::user("hello")]);

                // Miss
                cache.lookup(&request).await;

                // Insert + hit
                let key = grimnir::CacheKey::of(&request);
                cache
                    .put(key, None, ChatResponse::new("m", "cached"))
                    .await
                    .unwrap();
                cache.lookup(&request).await;
            })
        })
    });

    assert_eq!(counter_sum(&snapshotter, "grimnir_cache_misses_total"), 1);
    assert_eq!(counter_sum(&snapshotter, "grimnir_cache_hits_total"), 1);
}

#[test]
fn rejections_increment_the_rate_limited_counter() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let limiter = RateLimiter::new(
            RateLimitConfig::new()
                .max_requests(1)
                .window(Duration::from_secs(60)),
        );
        let identity = Identity::new("alice");
        limiter.admit(&identity);
        limiter.admit(&identity);
        limiter.admit(&identity);
    });

    assert_eq!(counter_sum(&snapshotter, "grimnir_rate_limited_total"), 2);
}
