use std::sync::Arc;

use feedgate::{Category, Feedgate, FetchError, Fetcher, Params, ProviderConfig, RateLimitType};
use feedgate_mock::MockFetcher;
use serde_json::json;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Suggested: RUST_LOG=info,feedgate=debug
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();

    let primary: Arc<dyn Fetcher> =
        MockFetcher::failing(FetchError::server("HTTP 503: maintenance")).shared();
    let backup: Arc<dyn Fetcher> =
        MockFetcher::returning(json!({ "symbol": "BTC", "price": 64_000.0 })).shared();

    let gate = Feedgate::builder()
        .with_provider(
            ProviderConfig::new("primary", Category::MarketPrice, 1)
                .rate_limit(RateLimitType::PerMinute, 30),
            primary,
        )
        .with_provider(ProviderConfig::new("backup", Category::MarketPrice, 2), backup)
        .build()?;

    let params = Params::new().with("symbol", "BTC");
    for _ in 0..4 {
        let report = gate.fetch_with_fallback(Category::MarketPrice, &params).await?;
        println!("{}", serde_json::to_string(&report)?);
    }

    println!("{}", serde_json::to_string_pretty(&gate.get_status())?);
    Ok(())
}
