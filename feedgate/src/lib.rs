//! Feedgate routes logical data requests across redundant upstream providers.
//!
//! Overview
//! - Providers are grouped by `Category` and tried in priority order, with the
//!   breaker health score and least-recent use as tie-breaks.
//! - A per-provider circuit breaker moves through ACTIVE, DEGRADED and
//!   COOLDOWN. Cooldowns grow exponentially with the failure streak, capped,
//!   and an upstream throttling signal forces an extended cooldown.
//! - A shared `RateLimiter` keeps calls inside each provider's configured
//!   window; a denied provider is skipped, never queued.
//! - An optional TTL cache answers repeated requests without touching any
//!   provider or quota.
//! - `HealthProbe` runs independently of the request path and only produces
//!   observability records.
//!
//! Key behaviors and trade-offs
//! - Attempts within one call are strictly sequential. This keeps the attempt
//!   log deterministic and avoids piling load on a provider that is already
//!   struggling, at the cost of latency when several providers fail in a row.
//! - When every provider is filtered out by its breaker, the router still
//!   tries the one that failed least recently, so a total outage degrades to
//!   one best-effort call instead of an immediate failure.
//! - Provider errors are folded into the returned `FetchReport`; only
//!   configuration problems (unknown category or provider) are `Err`.
//!
//! Examples
//! ```rust,ignore
//! use std::sync::Arc;
//! use feedgate::{Category, Feedgate, NoopSink, Params, ProviderConfig};
//!
//! let gate = Arc::new(
//!     Feedgate::builder()
//!         .with_provider(ProviderConfig::new("primary", Category::News, 1), primary)
//!         .with_provider(ProviderConfig::new("backup", Category::News, 2), backup)
//!         .build()?,
//! );
//!
//! let report = gate.fetch_with_fallback(Category::News, &Params::new()).await?;
//! if !report.success {
//!     for a in &report.attempts {
//!         eprintln!("{} {:?} {:?}", a.provider, a.status, a.error);
//!     }
//! }
//!
//! let probe = gate.health_probe(Arc::new(NoopSink));
//! let handle = probe.spawn();
//! // ...
//! handle.stop().await;
//! ```
#![warn(missing_docs)]

pub(crate) mod core;
mod probe;
mod router;

pub use core::{Feedgate, FeedgateBuilder};
pub use probe::HealthProbe;

pub use feedgate_core::{
    BreakerPolicy, BreakerState, Fetcher, HealthSink, NoopSink, ProbeReply, ProbeTarget,
    Provider, ProviderRegistry, TaskHandle,
};
pub use feedgate_middleware::{RateLimiter, TtlCache, cache_key};

// Re-export the shared data types for convenience
pub use feedgate_types::{
    AttemptOutcome, AttemptRecord, BreakerConfig, CacheConfig, Category, CategoryStatus,
    FailureKind, FeedError, FeedgateConfig, FetchError, FetchReport, HealthCheckResult, Params,
    ProbeConfig, ProbeStatus, ProviderConfig, ProviderHealthSnapshot, ProviderStatus,
    RateLimitSnapshot, RateLimitType, StatusReport,
};
