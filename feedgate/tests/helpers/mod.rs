// Re-export helpers so tests can `use crate::helpers::*;`
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use feedgate::{
    Category, Feedgate, FeedgateBuilder, FetchError, HealthProbe, Params, ProbeConfig, ProbeReply,
    ProviderConfig,
};
pub use feedgate_mock::{MemorySink, MockBehavior, MockFetcher};
use serde_json::{Value, json};

pub const PRICE: Category = Category::MarketPrice;
pub const BTC: &str = "BTC";

/// Standard request parameters.
pub fn btc() -> Params {
    Params::new().with("symbol", BTC)
}

/// A successful price payload tagged with the provider that served it.
pub fn quote(provider: &str) -> Value {
    json!({ "symbol": BTC, "price": 64_000.0, "source": provider })
}

/// Mock that always answers with `quote(name)`.
pub fn ok(name: &str) -> Arc<MockFetcher> {
    MockFetcher::returning(quote(name)).shared()
}

/// Mock that always fails with a server error.
pub fn down() -> Arc<MockFetcher> {
    MockFetcher::failing(FetchError::server("HTTP 503")).shared()
}

/// Builder with `(name, priority, mock)` registered under `PRICE` and a short
/// per-call timeout.
pub fn builder(providers: &[(&str, u32, &Arc<MockFetcher>)]) -> FeedgateBuilder {
    providers.iter().fold(
        Feedgate::builder().provider_timeout(Duration::from_millis(200)),
        |b, (name, priority, mock)| {
            b.with_provider(
                ProviderConfig::new(*name, PRICE, *priority),
                Arc::clone(mock) as Arc<dyn feedgate::Fetcher>,
            )
        },
    )
}

/// Built gate for `providers`.
pub fn gate(providers: &[(&str, u32, &Arc<MockFetcher>)]) -> Feedgate {
    builder(providers).build().expect("gate builds")
}

/// Probe tuning scaled down for tests: ONLINE under 50ms, OFFLINE from
/// 150ms, a 100ms probe budget and no jitter.
pub fn fast_probe() -> ProbeConfig {
    ProbeConfig {
        interval_ms: 20,
        stagger_ms: 0,
        timeout_ms: 100,
        online_below_ms: 50,
        offline_at_ms: 150,
        offline_streak: 3,
        jitter_percent: 0,
    }
}

/// Mock with a health endpoint answering `code` after `delay`.
pub fn probed(code: u16, delay: Duration) -> Arc<MockFetcher> {
    MockFetcher::returning(json!({}))
        .with_probe(MockBehavior::Return(ProbeReply::new("/health", code)).after(delay))
        .shared()
}

/// Gate over `providers` with `fast_probe` and a probe writing to `sink`.
pub fn probe_over(
    providers: &[(&str, u32, &Arc<MockFetcher>)],
    sink: &Arc<MemorySink>,
) -> (Feedgate, Arc<HealthProbe>) {
    let gate = builder(providers).probe(fast_probe()).build().expect("gate builds");
    let probe = gate.health_probe(Arc::clone(sink) as Arc<dyn feedgate::HealthSink>);
    (gate, probe)
}
