use std::sync::Arc;
use std::time::Duration;

use feedgate::{FeedError, Feedgate, Fetcher, ProbeStatus, ProviderConfig, RateLimitType};

use crate::helpers::*;

#[tokio::test]
async fn providers_without_health_endpoint_are_skipped() {
    let plain = ok("plain");
    let checked = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("plain", 1, &plain), ("checked", 2, &checked)], &sink);

    assert!(probe.probe_provider(PRICE, "plain").await.unwrap().is_none());
    let cycle = probe.run_cycle().await;
    assert_eq!(cycle.len(), 1);
    assert_eq!(cycle[0].provider_name, "checked");
    assert_eq!(plain.probe_calls(), 0);
    assert!(probe.latest(PRICE, "plain").is_none());
}

#[tokio::test]
async fn unknown_provider_is_an_error() {
    let a = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);
    let err = probe.probe_provider(PRICE, "nope").await.unwrap_err();
    assert!(matches!(err, FeedError::UnknownProvider { .. }));
}

#[tokio::test]
async fn probes_consume_the_shared_rate_limit() {
    let a = probed(200, Duration::ZERO);
    let gate = Feedgate::builder()
        .probe(fast_probe())
        .with_provider(
            ProviderConfig::new("a", PRICE, 1).rate_limit(RateLimitType::PerHour, 2),
            Arc::clone(&a) as Arc<dyn Fetcher>,
        )
        .build()
        .unwrap();
    let sink = Arc::new(MemorySink::new());
    let probe = gate.health_probe(Arc::clone(&sink) as Arc<dyn feedgate::HealthSink>);

    assert!(probe.probe_provider(PRICE, "a").await.unwrap().is_some());
    assert!(probe.probe_provider(PRICE, "a").await.unwrap().is_some());
    assert!(probe.probe_provider(PRICE, "a").await.unwrap().is_none());
    assert_eq!(a.probe_calls(), 2);
    assert_eq!(sink.records().await.len(), 2);

    // The request path sees the same exhausted window.
    let r = gate.fetch_with_fallback(PRICE, &btc()).await.unwrap();
    assert!(!r.success);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn sink_failure_does_not_stop_probing() {
    let a = probed(200, Duration::ZERO);
    let b = probed(500, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a), ("b", 2, &b)], &sink);

    sink.set_rejecting(true);
    let cycle = probe.run_cycle().await;
    assert_eq!(cycle.len(), 2);
    assert!(sink.records().await.is_empty());
    assert_eq!(probe.latest(PRICE, "b").unwrap().status, ProbeStatus::Degraded);

    sink.set_rejecting(false);
    probe.run_cycle().await;
    assert_eq!(sink.records().await.len(), 2);
}

#[tokio::test]
async fn latest_tracks_most_recent_result() {
    let a = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    probe.probe_provider(PRICE, "a").await.unwrap();
    assert_eq!(probe.latest(PRICE, "a").unwrap().status, ProbeStatus::Online);

    a.set_probe_behavior(MockBehavior::Return(feedgate::ProbeReply::new("/health", 502)))
        .await;
    probe.probe_provider(PRICE, "a").await.unwrap();
    let latest = probe.latest(PRICE, "a").unwrap();
    assert_eq!(latest.status, ProbeStatus::Degraded);
    assert_eq!(latest.status_code, Some(502));
}

#[tokio::test]
async fn spawned_loop_probes_until_stopped() {
    let a = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    let handle = Arc::clone(&probe).spawn();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!handle.is_finished());
    handle.stop().await;

    let after_stop = a.probe_calls();
    assert!(after_stop >= 2, "expected several cycles, saw {after_stop}");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(a.probe_calls(), after_stop);
    assert_eq!(sink.records().await.len(), after_stop);
}

#[tokio::test]
async fn stop_lets_in_flight_probe_finish() {
    let a = probed(200, Duration::from_millis(60));
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    let handle = Arc::clone(&probe).spawn();
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.stop().await;

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ProbeStatus::Degraded);
}

#[tokio::test]
async fn dropping_the_handle_stops_the_loop() {
    let a = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    drop(Arc::clone(&probe).spawn());
    tokio::time::sleep(Duration::from_millis(60)).await;
    let calls = a.probe_calls();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(a.probe_calls(), calls);
    assert!(calls <= 1);
}
