//! Results and snapshots handed back to callers and observers.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Category, FailureKind, RateLimitType};

/// Outcome of a single provider in one routed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The provider returned data.
    Success,
    /// The provider was called and failed.
    Failed,
    /// The provider was not called (cooldown or rate limit).
    Skipped,
}

/// One entry of the per-call attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Provider name.
    pub provider: String,
    /// What happened.
    pub status: AttemptOutcome,
    /// Wall time spent in the call, when one was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Failure or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification for failed attempts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<FailureKind>,
}

impl AttemptRecord {
    /// Successful attempt.
    pub fn success(provider: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptOutcome::Success,
            duration_ms: Some(duration_ms),
            error: None,
            error_type: None,
        }
    }

    /// Failed attempt.
    pub fn failed(
        provider: impl Into<String>,
        duration_ms: u64,
        kind: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptOutcome::Failed,
            duration_ms: Some(duration_ms),
            error: Some(error.into()),
            error_type: Some(kind),
        }
    }

    /// Provider excluded before any call was made.
    pub fn skipped(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: AttemptOutcome::Skipped,
            duration_ms: None,
            error: Some(reason.into()),
            error_type: None,
        }
    }
}

/// Structured result of `fetch_with_fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Category that was requested.
    pub category: Category,
    /// True when some provider (or the cache) produced data.
    pub success: bool,
    /// Payload on success.
    pub data: Option<Value>,
    /// Provider that produced `data`.
    pub provider: Option<String>,
    /// Ordered attempt log.
    pub attempts: Vec<AttemptRecord>,
    /// Summary error on exhaustion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when served from the TTL cache.
    pub cached: bool,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

impl FetchReport {
    /// Attempts that actually called a provider.
    pub fn executed(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts
            .iter()
            .filter(|a| a.status != AttemptOutcome::Skipped)
    }
}

/// Request-path circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Healthy, or probationary after a cooldown elapsed.
    Active,
    /// Recent failures below the threshold.
    Degraded,
    /// Skipped until the backoff elapses.
    Cooldown,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Cooldown => "cooldown",
        })
    }
}

/// Current rate-limit window for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Window type.
    pub limit_type: RateLimitType,
    /// Budget per window.
    pub limit_value: u32,
    /// Usage in the current window.
    pub current_usage: u32,
    /// Milliseconds until the window resets.
    pub reset_in_ms: u64,
}

/// Point-in-time view of one provider, consumed by dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealthSnapshot {
    /// Provider name.
    pub name: String,
    /// Category served.
    pub category: Category,
    /// Configured priority.
    pub priority: u32,
    /// Circuit state.
    pub status: ProviderStatus,
    /// Percentage of successful requests, in `[0, 100]`.
    pub success_rate: f64,
    /// Current failure streak.
    pub consecutive_failures: u32,
    /// Whether the breaker currently admits calls.
    pub available: bool,
    /// Last successful call.
    pub last_success: Option<DateTime<Utc>>,
    /// Last failed call.
    pub last_failure: Option<DateTime<Utc>>,
    /// Total calls recorded.
    pub total_requests: u64,
    /// Successful calls recorded.
    pub successful_requests: u64,
    /// Failed calls recorded.
    pub failed_requests: u64,
    /// Remaining cooldown, zero when available.
    pub backoff_remaining_ms: u64,
    /// Ordering score among same-priority providers (lower is better).
    pub health_score: f64,
    /// Rate window, when one is configured.
    pub rate_limit: Option<RateLimitSnapshot>,
}

/// Snapshots grouped by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatus {
    /// Category.
    pub category: Category,
    /// Providers in registration order.
    pub providers: Vec<ProviderHealthSnapshot>,
}

/// Full status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Per-category provider snapshots.
    pub categories: Vec<CategoryStatus>,
}

/// Classification produced by the out-of-band health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    /// Fast and 2xx.
    Online,
    /// Slow or non-2xx.
    Degraded,
    /// Timed out, very slow, or unreachable.
    Offline,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "ONLINE",
            Self::Degraded => "DEGRADED",
            Self::Offline => "OFFLINE",
        })
    }
}

/// Record written to the persistence collaborator after every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Provider probed.
    pub provider_name: String,
    /// Category of the provider.
    pub category: Category,
    /// Classification.
    pub status: ProbeStatus,
    /// Observed latency.
    pub response_time_ms: u64,
    /// HTTP status code, when available.
    pub status_code: Option<u16>,
    /// Failure detail, when any.
    pub error_message: Option<String>,
    /// When the probe completed.
    pub timestamp: DateTime<Utc>,
    /// Endpoint that was exercised.
    pub endpoint_tested: String,
}
