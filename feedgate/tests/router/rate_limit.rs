use std::sync::Arc;

use feedgate::{AttemptOutcome, Feedgate, FeedError, Fetcher, ProviderConfig, RateLimitType};

use crate::helpers::*;

fn limited(a: &Arc<MockFetcher>, b: Option<&Arc<MockFetcher>>, per_minute: u32) -> Feedgate {
    let mut builder = Feedgate::builder().with_provider(
        ProviderConfig::new("a", PRICE, 1).rate_limit(RateLimitType::PerMinute, per_minute),
        Arc::clone(a) as Arc<dyn Fetcher>,
    );
    if let Some(b) = b {
        builder = builder.with_provider(
            ProviderConfig::new("b", PRICE, 2),
            Arc::clone(b) as Arc<dyn Fetcher>,
        );
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn exhausted_window_routes_to_backup() {
    let a = ok("a");
    let b = ok("b");
    let gate = limited(&a, Some(&b), 2);

    for _ in 0..2 {
        let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
        assert_eq!(r.provider.as_deref(), Some("a"));
    }
    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert_eq!(r.provider.as_deref(), Some("b"));
    assert_eq!(r.attempts.len(), 1);
    assert_eq!(a.calls(), 2);

    // Rate limiting is local accounting, not a provider failure.
    let pa = gate.registry().get(PRICE, "a").unwrap();
    assert_eq!(pa.state().consecutive_failures(), 0);
    assert!(pa.is_available());
}

#[tokio::test]
async fn rate_limited_provider_is_never_forced() {
    let a = ok("a");
    let gate = limited(&a, None, 1);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();

    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!r.success);
    assert_eq!(a.calls(), 1);
    assert_eq!(r.attempts.len(), 1);
    assert_eq!(r.attempts[0].status, AttemptOutcome::Skipped);
    let reason = r.attempts[0].error.as_deref().unwrap();
    assert!(reason.contains("rate limit exceeded for a"), "{reason}");
    assert!(r.error.unwrap().starts_with("All providers failed: "));
}

#[tokio::test]
async fn failures_do_not_consume_budget() {
    let a = MockFetcher::default().shared();
    a.push_script([MockBehavior::Fail(feedgate::FetchError::server("HTTP 500"))])
        .await;
    let gate = limited(&a, None, 1);

    let first = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!first.success);
    let snap = gate.rate_limiter().snapshot("a").unwrap();
    assert_eq!(snap.current_usage, 0);

    let second = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(second.success);
    assert_eq!(gate.rate_limiter().snapshot("a").unwrap().current_usage, 1);
}

#[tokio::test]
async fn direct_limiter_check_reports_window() {
    let a = ok("a");
    let gate = limited(&a, None, 1);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();

    match gate.rate_limiter().can_make_request("a") {
        Err(FeedError::RateLimitExceeded {
            provider,
            limit_type,
            limit,
            current_usage,
            reset_in_ms,
        }) => {
            assert_eq!(provider, "a");
            assert_eq!(limit_type, RateLimitType::PerMinute);
            assert_eq!((limit, current_usage), (1, 1));
            assert!(reset_in_ms <= 60_000);
        }
        other => panic!("expected a rate-limit denial, got {other:?}"),
    }
    assert!(gate.rate_limiter().can_make_request("b").is_ok());
}

#[tokio::test]
async fn shared_limiter_counts_across_gates() {
    let limiter = Arc::new(feedgate::RateLimiter::new());
    let a = ok("a");
    let build = || {
        Feedgate::builder()
            .rate_limiter(Arc::clone(&limiter))
            .with_provider(
                ProviderConfig::new("a", PRICE, 1).rate_limit(RateLimitType::PerHour, 1),
                Arc::clone(&a) as Arc<dyn Fetcher>,
            )
            .build()
            .unwrap()
    };
    let first = build();
    let second = build();

    assert!(first.fetch_with_fallback(PRICE, &btc()).await.unwrap().success);
    assert!(!second.fetch_with_fallback(PRICE, &btc()).await.unwrap().success);
    assert_eq!(a.calls(), 1);
}
