//! Static configuration loaded once at startup.

use core::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Category, FeedError};

/// Accounting window for a provider rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitType {
    /// One-second window.
    PerSecond,
    /// One-minute window.
    PerMinute,
    /// One-hour window.
    PerHour,
    /// One-day window.
    PerDay,
}

impl RateLimitType {
    /// Length of the accounting window.
    #[must_use]
    pub const fn window(self) -> Duration {
        match self {
            Self::PerSecond => Duration::from_secs(1),
            Self::PerMinute => Duration::from_secs(60),
            Self::PerHour => Duration::from_secs(60 * 60),
            Self::PerDay => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerSecond => "per_second",
            Self::PerMinute => "per_minute",
            Self::PerHour => "per_hour",
            Self::PerDay => "per_day",
        }
    }
}

impl fmt::Display for RateLimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique name within the category.
    pub name: String,
    /// Category this provider serves.
    pub category: Category,
    /// Lower values are tried first.
    pub priority: u32,
    /// Upper bound for the exponential backoff of this provider, in seconds.
    /// Falls back to `BreakerConfig::backoff_cap_secs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<u64>,
    /// Consecutive failures before the provider enters cooldown.
    /// Falls back to `BreakerConfig::max_failures`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failures: Option<u32>,
    /// Optional rate-limit window type.
    #[serde(default)]
    pub rate_limit_type: Option<RateLimitType>,
    /// Optional rate-limit budget per window.
    #[serde(default)]
    pub rate_limit_value: Option<u32>,
    /// Optional per-provider call timeout overriding the global one.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ProviderConfig {
    /// Provider using the shared breaker settings and no rate limit.
    pub fn new(name: impl Into<String>, category: Category, priority: u32) -> Self {
        Self {
            name: name.into(),
            category,
            priority,
            cooldown_seconds: None,
            max_failures: None,
            rate_limit_type: None,
            rate_limit_value: None,
            timeout_ms: None,
        }
    }

    /// Set the failure threshold.
    #[must_use]
    pub const fn max_failures(mut self, n: u32) -> Self {
        self.max_failures = Some(n);
        self
    }

    /// Set the backoff cap in seconds.
    #[must_use]
    pub const fn cooldown_seconds(mut self, secs: u64) -> Self {
        self.cooldown_seconds = Some(secs);
        self
    }

    /// Attach a rate limit.
    #[must_use]
    pub const fn rate_limit(mut self, limit_type: RateLimitType, value: u32) -> Self {
        self.rate_limit_type = Some(limit_type);
        self.rate_limit_value = Some(value);
        self
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Rate limit as a pair when both halves are configured.
    #[must_use]
    pub const fn rate_limit_pair(&self) -> Option<(RateLimitType, u32)> {
        match (self.rate_limit_type, self.rate_limit_value) {
            (Some(t), Some(v)) => Some((t, v)),
            _ => None,
        }
    }

    /// Validate invariants that the type system cannot express.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty name, a zero failure threshold, a
    /// zero rate limit, or a half-configured rate limit.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.name.trim().is_empty() {
            return Err(FeedError::InvalidConfig(
                "provider name must not be empty".to_string(),
            ));
        }
        if self.max_failures == Some(0) {
            return Err(FeedError::InvalidConfig(format!(
                "{}: max_failures must be at least 1",
                self.name
            )));
        }
        match (self.rate_limit_type, self.rate_limit_value) {
            (Some(_), Some(0)) => Err(FeedError::InvalidConfig(format!(
                "{}: rate_limit_value must be positive",
                self.name
            ))),
            (Some(_), None) | (None, Some(_)) => Err(FeedError::InvalidConfig(format!(
                "{}: rate_limit_type and rate_limit_value must be set together",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Circuit-breaker tuning shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Default failure threshold for providers that do not override it.
    pub max_failures: u32,
    /// Base of the exponential backoff (`base ^ consecutive_failures` seconds).
    pub backoff_base: f64,
    /// Default backoff cap in seconds.
    pub backoff_cap_secs: u64,
    /// Fixed cooldown applied when an upstream reports throttling.
    pub rate_limit_cooldown_secs: u64,
    /// Health-score penalty added per consecutive failure.
    pub failure_penalty: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            backoff_base: 2.0,
            backoff_cap_secs: 300,
            rate_limit_cooldown_secs: 300,
            failure_penalty: 10.0,
        }
    }
}

impl BreakerConfig {
    /// Reject a zero threshold or a backoff base that cannot grow.
    ///
    /// # Errors
    /// Returns `InvalidConfig` describing the offending field.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.max_failures == 0 {
            return Err(FeedError::InvalidConfig(
                "breaker.max_failures must be at least 1".to_string(),
            ));
        }
        if !self.backoff_base.is_finite() || self.backoff_base < 1.0 {
            return Err(FeedError::InvalidConfig(
                "breaker.backoff_base must be a finite number >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// TTL cache sitting in front of the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for successful results. Zero disables caching.
    pub ttl_ms: u64,
    /// Maximum number of entries before least-recently-used eviction.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            capacity: 1024,
        }
    }
}

impl CacheConfig {
    /// TTL as a `Duration`.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Out-of-band health probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Sleep between probe cycles.
    pub interval_ms: u64,
    /// Delay between consecutive probes within a cycle.
    pub stagger_ms: u64,
    /// Budget for a single probe.
    pub timeout_ms: u64,
    /// Latency under which a 2xx probe counts as ONLINE.
    pub online_below_ms: u64,
    /// Latency at or above which a probe counts as OFFLINE.
    pub offline_at_ms: u64,
    /// Consecutive OFFLINE probes that pin a provider OFFLINE.
    pub offline_streak: u32,
    /// Random jitter added to the inter-cycle sleep, in percent.
    pub jitter_percent: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            stagger_ms: 100,
            timeout_ms: 10_000,
            online_below_ms: 2_000,
            offline_at_ms: 5_000,
            offline_streak: 3,
            jitter_percent: 10,
        }
    }
}

impl ProbeConfig {
    /// Inter-cycle interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Delay between probes.
    #[must_use]
    pub const fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    /// Single-probe budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedgateConfig {
    /// Every provider known to the process.
    pub providers: Vec<ProviderConfig>,
    /// Default per-call timeout.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Breaker tuning.
    #[serde(default)]
    pub breaker: BreakerConfig,
    /// Optional result cache; `None` disables it.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    /// Probe tuning.
    #[serde(default)]
    pub probe: ProbeConfig,
}

const fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl Default for FeedgateConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            provider_timeout_ms: default_provider_timeout_ms(),
            breaker: BreakerConfig::default(),
            cache: None,
            probe: ProbeConfig::default(),
        }
    }
}

impl FeedgateConfig {
    /// Parse a JSON configuration document.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the document does not parse or a provider
    /// entry fails validation.
    pub fn from_json_str(s: &str) -> Result<Self, FeedError> {
        let cfg: Self =
            serde_json::from_str(s).map_err(|e| FeedError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the breaker tuning and every provider entry.
    ///
    /// # Errors
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<(), FeedError> {
        self.breaker.validate()?;
        self.providers.iter().try_for_each(ProviderConfig::validate)
    }

    /// Default per-call timeout as a `Duration`.
    #[must_use]
    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
