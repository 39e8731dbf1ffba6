use std::time::Duration;

use feedgate::{CacheConfig, Params};

use crate::helpers::*;

fn cached_gate(a: &std::sync::Arc<MockFetcher>, ttl_ms: u64) -> feedgate::Feedgate {
    builder(&[("a", 1, a)])
        .cache(CacheConfig {
            ttl_ms,
            capacity: 64,
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn hit_bypasses_providers_and_quota() {
    let a = ok("a");
    let gate = cached_gate(&a, 60_000);

    let first = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!first.cached);
    let second = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(second.success);
    assert!(second.cached);
    assert!(second.attempts.is_empty());
    assert_eq!(second.provider.as_deref(), Some("a"));
    assert_eq!(second.data, first.data);
    assert_eq!(a.calls(), 1);

    let snap = &gate.get_provider_health(PRICE).unwrap()[0];
    assert_eq!(snap.total_requests, 1);
}

#[tokio::test]
async fn different_params_miss() {
    let a = ok("a");
    let gate = cached_gate(&a, 60_000);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    gate.fetch_with_fallback(PRICE, &Params::new().with("symbol", "ETH"))
        .await
        .unwrap();
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn params_that_spell_the_same_query_string_miss() {
    let a = ok("a");
    let gate = cached_gate(&a, 60_000);
    let plain = Params::new().with("a", 1).with("b", 2);
    let packed = Params::new().with("a=1&b", 2);

    let first = gate.fetch_with_fallback(PRICE, &plain).await.unwrap();
    assert!(!first.cached);
    let second = gate.fetch_with_fallback(PRICE, &packed).await.unwrap();
    assert!(second.success);
    assert!(!second.cached);
    assert_eq!(a.calls(), 2);
    assert_eq!(a.seen_params().await.last(), Some(&packed));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let a = ok("a");
    let gate = cached_gate(&a, 40);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!r.cached);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let a = down();
    let gate = cached_gate(&a, 60_000);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!r.cached);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn fresh_fetch_skips_read_but_refreshes() {
    let a = ok("a");
    let gate = cached_gate(&a, 60_000);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();

    let fresh = gate.fetch_with_fallback_fresh(PRICE, &btc()).await.unwrap();
    assert!(!fresh.cached);
    assert_eq!(a.calls(), 2);

    let after = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(after.cached);
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn invalidate_and_clear() {
    let a = ok("a");
    let gate = cached_gate(&a, 60_000);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();

    assert!(gate.invalidate(PRICE, &btc()).await);
    assert!(!gate.invalidate(PRICE, &btc()).await);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert_eq!(a.calls(), 2);

    gate.clear_cache().await;
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert_eq!(a.calls(), 3);
}

#[tokio::test]
async fn no_cache_configured() {
    let a = ok("a");
    let gate = gate(&[("a", 1, &a)]);
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert_eq!(a.calls(), 2);
    assert!(!gate.invalidate(PRICE, &btc()).await);
}
