use std::sync::Arc;
use std::time::Duration;

use feedgate::{FetchError, ProbeReply, ProbeStatus};

use crate::helpers::*;

#[tokio::test]
async fn fast_2xx_is_online() {
    let a = probed(200, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    let r = probe.probe_provider(PRICE, "a").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Online);
    assert_eq!(r.status_code, Some(200));
    assert_eq!(r.endpoint_tested, "/health");
    assert!(r.error_message.is_none());
    assert_eq!(r.provider_name, "a");
    assert_eq!(r.category, PRICE);
}

#[tokio::test]
async fn slow_or_non_2xx_is_degraded() {
    let slow = probed(200, Duration::from_millis(70));
    let broken = probed(503, Duration::ZERO);
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("slow", 1, &slow), ("broken", 2, &broken)], &sink);

    let r = probe.probe_provider(PRICE, "slow").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Degraded);
    assert!(r.response_time_ms >= 50);

    let r = probe.probe_provider(PRICE, "broken").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Degraded);
    assert_eq!(r.status_code, Some(503));
    assert_eq!(r.error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn timeout_and_network_failure_are_offline() {
    let stuck = MockFetcher::returning(serde_json::json!({}))
        .with_probe(MockBehavior::Hang)
        .shared();
    let refused = MockFetcher::returning(serde_json::json!({}))
        .with_probe(MockBehavior::Fail(FetchError::unknown("connection refused")))
        .shared();
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("stuck", 1, &stuck), ("refused", 2, &refused)], &sink);

    let r = probe.probe_provider(PRICE, "stuck").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Offline);
    assert_eq!(r.error_message.as_deref(), Some("timed out after 100ms"));
    assert!(r.status_code.is_none());

    let r = probe.probe_provider(PRICE, "refused").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Offline);
    assert!(r.error_message.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn offline_streak_pins_next_recovery() {
    let a = probed(200, Duration::ZERO);
    a.push_probe_script([
        MockBehavior::Fail(FetchError::unknown("down")),
        MockBehavior::Fail(FetchError::unknown("down")),
        MockBehavior::Fail(FetchError::unknown("down")),
    ])
    .await;
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    let mut seen = Vec::new();
    for _ in 0..5 {
        let r = probe.probe_provider(PRICE, "a").await.unwrap().unwrap();
        seen.push(r.status);
    }
    assert_eq!(
        seen,
        [
            ProbeStatus::Offline,
            ProbeStatus::Offline,
            ProbeStatus::Offline,
            ProbeStatus::Offline,
            ProbeStatus::Online,
        ]
    );
    // The forced record still carries the real reply.
    let records = sink.records_for("a").await;
    assert_eq!(records[3].status_code, Some(200));
}

#[tokio::test]
async fn probing_never_touches_breaker_state() {
    let a = MockFetcher::returning(serde_json::json!({}))
        .with_probe(MockBehavior::Fail(FetchError::unknown("down")))
        .shared();
    let sink = Arc::new(MemorySink::new());
    let (gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    for _ in 0..5 {
        probe.probe_provider(PRICE, "a").await.unwrap();
    }
    let p = gate.registry().get(PRICE, "a").unwrap();
    assert_eq!(p.state().consecutive_failures(), 0);
    assert_eq!(p.state().total_requests(), 0);
    assert!(p.is_available());
}

#[tokio::test]
async fn reply_without_status_counts_as_success() {
    let a = MockFetcher::returning(serde_json::json!({}))
        .with_probe(MockBehavior::Return(ProbeReply {
            status_code: None,
            endpoint: "ws://feed".to_string(),
        }))
        .shared();
    let sink = Arc::new(MemorySink::new());
    let (_gate, probe) = probe_over(&[("a", 1, &a)], &sink);

    let r = probe.probe_provider(PRICE, "a").await.unwrap().unwrap();
    assert_eq!(r.status, ProbeStatus::Online);
    assert_eq!(r.endpoint_tested, "ws://feed");
}
