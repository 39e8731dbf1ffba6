//! Scriptable adapters and an in-memory sink for exercising feedgate without
//! real upstreams.
#![warn(missing_docs)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use feedgate_core::{
    FeedError, FetchError, Fetcher, HealthCheckResult, HealthSink, Params, ProbeReply,
    ProbeTarget,
};
use serde_json::Value;
use tokio::sync::Mutex;

/// Instruction for how one call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(FetchError),
    /// Hang indefinitely (simulate a timeout).
    Hang,
    /// Sleep, then behave as the inner instruction.
    Delay(Duration, Box<MockBehavior<T>>),
}

impl<T> MockBehavior<T> {
    /// Sleep for `d` before behaving as `self`.
    #[must_use]
    pub fn after(self, d: Duration) -> Self {
        Self::Delay(d, Box::new(self))
    }
}

async fn run<T>(mut behavior: MockBehavior<T>) -> Result<T, FetchError> {
    loop {
        match behavior {
            MockBehavior::Return(v) => return Ok(v),
            MockBehavior::Fail(e) => return Err(e),
            MockBehavior::Hang => return std::future::pending().await,
            MockBehavior::Delay(d, inner) => {
                tokio::time::sleep(d).await;
                behavior = *inner;
            }
        }
    }
}

struct Script<T> {
    default: MockBehavior<T>,
    queue: VecDeque<MockBehavior<T>>,
}

impl<T: Clone> Script<T> {
    fn new(default: MockBehavior<T>) -> Self {
        Self {
            default,
            queue: VecDeque::new(),
        }
    }

    fn next(&mut self) -> MockBehavior<T> {
        self.queue
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// A `Fetcher` whose behaviour tests control.
///
/// Queued behaviours are consumed one per call; once the queue is empty every
/// call uses the default.
pub struct MockFetcher {
    fetch: Mutex<Script<Value>>,
    probe: Option<Mutex<Script<ProbeReply>>>,
    seen: Mutex<Vec<Params>>,
    calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl std::fmt::Debug for MockFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFetcher")
            .field("calls", &self.calls())
            .field("probe_calls", &self.probe_calls())
            .finish_non_exhaustive()
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new(MockBehavior::Return(Value::Object(serde_json::Map::new())))
    }
}

impl MockFetcher {
    /// Fetcher with `default` as the behaviour for every call.
    #[must_use]
    pub fn new(default: MockBehavior<Value>) -> Self {
        Self {
            fetch: Mutex::new(Script::new(default)),
            probe: None,
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Always return `value`.
    #[must_use]
    pub fn returning(value: Value) -> Self {
        Self::new(MockBehavior::Return(value))
    }

    /// Always fail with `err`.
    #[must_use]
    pub fn failing(err: FetchError) -> Self {
        Self::new(MockBehavior::Fail(err))
    }

    /// Never answer.
    #[must_use]
    pub fn hanging() -> Self {
        Self::new(MockBehavior::Hang)
    }

    /// Expose a health endpoint with `default` as its behaviour.
    #[must_use]
    pub fn with_probe(mut self, default: MockBehavior<ProbeReply>) -> Self {
        self.probe = Some(Mutex::new(Script::new(default)));
        self
    }

    /// Shorthand for an `Arc` ready to hand to the builder.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Replace the default fetch behaviour.
    pub async fn set_behavior(&self, behavior: MockBehavior<Value>) {
        self.fetch.lock().await.default = behavior;
    }

    /// Queue behaviours for the next calls, in order.
    pub async fn push_script(&self, behaviors: impl IntoIterator<Item = MockBehavior<Value>>) {
        self.fetch.lock().await.queue.extend(behaviors);
    }

    /// Replace the default probe behaviour. No-op without a health endpoint.
    pub async fn set_probe_behavior(&self, behavior: MockBehavior<ProbeReply>) {
        if let Some(p) = &self.probe {
            p.lock().await.default = behavior;
        }
    }

    /// Queue probe behaviours for the next probes, in order.
    pub async fn push_probe_script(
        &self,
        behaviors: impl IntoIterator<Item = MockBehavior<ProbeReply>>,
    ) {
        if let Some(p) = &self.probe {
            p.lock().await.queue.extend(behaviors);
        }
    }

    /// Number of `fetch` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of probe calls so far.
    #[must_use]
    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Parameters of every `fetch` call, oldest first.
    pub async fn seen_params(&self) -> Vec<Params> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, params: &Params) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().await.push(params.clone());
        let behavior = self.fetch.lock().await.next();
        run(behavior).await
    }

    fn as_probe_target(&self) -> Option<&dyn ProbeTarget> {
        self.probe.as_ref().map(|_| self as &dyn ProbeTarget)
    }
}

#[async_trait]
impl ProbeTarget for MockFetcher {
    async fn probe(&self) -> Result<ProbeReply, FetchError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = match &self.probe {
            Some(p) => p.lock().await.next(),
            None => MockBehavior::Fail(FetchError::unknown("no health endpoint")),
        };
        run(behavior).await
    }
}

/// `HealthSink` that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<HealthCheckResult>>,
    reject: AtomicBool,
}

impl MemorySink {
    /// Empty sink that accepts writes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Every accepted record, oldest first.
    pub async fn records(&self) -> Vec<HealthCheckResult> {
        self.records.lock().await.clone()
    }

    /// Accepted records for one provider.
    pub async fn records_for(&self, provider: &str) -> Vec<HealthCheckResult> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.provider_name == provider)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HealthSink for MemorySink {
    async fn record(&self, result: &HealthCheckResult) -> Result<(), FeedError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(FeedError::Sink("sink is rejecting writes".to_string()));
        }
        self.records.lock().await.push(result.clone());
        Ok(())
    }
}
