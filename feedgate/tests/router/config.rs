use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use feedgate::{
    Category, FeedError, Feedgate, FeedgateBuilder, FeedgateConfig, Fetcher, ProviderConfig,
    ProviderStatus,
};

use crate::helpers::*;

const DOC: &str = r#"{
    "provider_timeout_ms": 150,
    "breaker": { "max_failures": 2 },
    "cache": { "ttl_ms": 60000, "capacity": 16 },
    "providers": [
        { "name": "primary", "category": "market_price", "priority": 1,
          "rate_limit_type": "per_minute", "rate_limit_value": 30 },
        { "name": "backup", "category": "market_price", "priority": 2,
          "max_failures": 1, "cooldown_seconds": 30 },
        { "name": "wire", "category": "news", "priority": 1, "timeout_ms": 50 }
    ]
}"#;

fn adapters(entries: &[(&str, &Arc<MockFetcher>)]) -> HashMap<String, Arc<dyn Fetcher>> {
    entries
        .iter()
        .map(|(name, m)| ((*name).to_string(), Arc::clone(m) as Arc<dyn Fetcher>))
        .collect()
}

#[tokio::test]
async fn builds_from_json_document() {
    let primary = ok("primary");
    let backup = ok("backup");
    let wire = MockFetcher::hanging().shared();
    let cfg = FeedgateConfig::from_json_str(DOC).unwrap();
    let gate = FeedgateBuilder::from_config(
        cfg,
        &adapters(&[("primary", &primary), ("backup", &backup), ("wire", &wire)]),
    )
    .unwrap()
    .build()
    .unwrap();

    assert_eq!(gate.registry().len(), 3);
    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert_eq!(r.provider.as_deref(), Some("primary"));
    assert!(gate.fetch_with_fallback(PRICE, &btc()).await.unwrap().cached);
    assert!(gate.rate_limiter().is_configured("primary"));
    assert!(!gate.rate_limiter().is_configured("backup"));

    // Per-provider timeout overrides the global one.
    let started = std::time::Instant::now();
    let r = gate.fetch_with_fallback(Category::News, &btc()).await.unwrap();
    assert!(!r.success);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn provider_breaker_overrides_apply() {
    let primary = down();
    let backup = down();
    let wire = ok("wire");
    let cfg = FeedgateConfig::from_json_str(DOC).unwrap();
    let gate = FeedgateBuilder::from_config(
        cfg,
        &adapters(&[("primary", &primary), ("backup", &backup), ("wire", &wire)]),
    )
    .unwrap()
    .build()
    .unwrap();

    gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    let snaps = gate.get_provider_health(PRICE).unwrap();
    // Shared threshold is 2; backup trips after one.
    assert_eq!(snaps[0].status, ProviderStatus::Degraded);
    assert_eq!(snaps[1].status, ProviderStatus::Cooldown);
    assert!(snaps[1].backoff_remaining_ms <= 2_000);
}

#[test]
fn missing_adapter_is_unknown_provider() {
    let primary = ok("primary");
    let cfg = FeedgateConfig::from_json_str(DOC).unwrap();
    let err = FeedgateBuilder::from_config(cfg, &adapters(&[("primary", &primary)])).unwrap_err();
    assert!(matches!(err, FeedError::UnknownProvider { ref provider } if provider == "backup"));
}

#[test]
fn duplicate_name_in_category_is_rejected() {
    let a = ok("a");
    let err = builder(&[("a", 1, &a), ("a", 2, &a)]).build().unwrap_err();
    assert!(matches!(err, FeedError::DuplicateProvider { .. }));
    assert!(err.is_configuration());
}

#[test]
fn same_name_in_two_categories_is_allowed() {
    let a = ok("a");
    let gate = builder(&[("a", 1, &a)])
        .with_provider(
            ProviderConfig::new("a", Category::News, 1),
            Arc::clone(&a) as Arc<dyn Fetcher>,
        )
        .build()
        .unwrap();
    assert_eq!(gate.registry().len(), 2);
}

#[test]
fn empty_gate_is_invalid() {
    let err = Feedgate::builder().build().unwrap_err();
    assert!(matches!(err, FeedError::InvalidConfig(_)));
}

#[test]
fn invalid_provider_entry_is_rejected() {
    let a = ok("a");
    let err = Feedgate::builder()
        .with_provider(
            ProviderConfig::new("", PRICE, 1),
            Arc::clone(&a) as Arc<dyn Fetcher>,
        )
        .build()
        .unwrap_err();
    assert!(matches!(err, FeedError::InvalidConfig(_)));

    let malformed = FeedgateConfig::from_json_str("{ \"providers\": [ { \"name\": 1 } ] }");
    assert!(matches!(malformed, Err(FeedError::InvalidConfig(_))));
}
