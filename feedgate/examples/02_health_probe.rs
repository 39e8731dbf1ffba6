use std::sync::Arc;
use std::time::Duration;

use feedgate::{Category, Feedgate, Fetcher, HealthSink, ProbeConfig, ProbeReply, ProviderConfig};
use feedgate_mock::{MemorySink, MockBehavior, MockFetcher};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let fast: Arc<dyn Fetcher> = MockFetcher::returning(json!({}))
        .with_probe(MockBehavior::Return(ProbeReply::new("/ping", 200)))
        .shared();
    let slow: Arc<dyn Fetcher> = MockFetcher::returning(json!({}))
        .with_probe(
            MockBehavior::Return(ProbeReply::new("/status", 200)).after(Duration::from_millis(300)),
        )
        .shared();

    let gate = Feedgate::builder()
        .with_provider(ProviderConfig::new("fast", Category::News, 1), fast)
        .with_provider(ProviderConfig::new("slow", Category::News, 2), slow)
        .probe(ProbeConfig {
            interval_ms: 1_000,
            online_below_ms: 200,
            offline_at_ms: 1_000,
            ..ProbeConfig::default()
        })
        .build()?;

    let sink = Arc::new(MemorySink::new());
    let probe = gate.health_probe(Arc::clone(&sink) as Arc<dyn HealthSink>);
    let handle = Arc::clone(&probe).spawn();
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.stop().await;

    for record in sink.records().await {
        println!(
            "{} {} {}ms {}",
            record.provider_name, record.status, record.response_time_ms, record.endpoint_tested
        );
    }
    Ok(())
}
