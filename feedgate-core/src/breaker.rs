use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use feedgate_types::{BreakerConfig, FailureKind, ProviderConfig, ProviderStatus};

/// Tuning for one provider's breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerPolicy {
    /// Consecutive failures that open the breaker.
    pub max_failures: u32,
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
    /// Upper bound for the exponential backoff.
    pub backoff_cap: Duration,
    /// Fixed cooldown forced by an upstream throttling signal.
    pub rate_limit_cooldown: Duration,
    /// Health-score penalty per consecutive failure.
    pub failure_penalty: f64,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from_config(&BreakerConfig::default())
    }
}

impl BreakerPolicy {
    /// Policy from the shared breaker configuration.
    #[must_use]
    pub fn from_config(cfg: &BreakerConfig) -> Self {
        Self {
            max_failures: cfg.max_failures.max(1),
            backoff_base: cfg.backoff_base,
            backoff_cap: Duration::from_secs(cfg.backoff_cap_secs),
            rate_limit_cooldown: Duration::from_secs(cfg.rate_limit_cooldown_secs),
            failure_penalty: cfg.failure_penalty,
        }
    }

    /// Policy for one provider: the provider's `max_failures` and
    /// `cooldown_seconds` override the shared threshold and cap.
    #[must_use]
    pub fn for_provider(shared: &BreakerConfig, provider: &ProviderConfig) -> Self {
        let base = Self::from_config(shared);
        Self {
            max_failures: provider.max_failures.map_or(base.max_failures, |n| n.max(1)),
            backoff_cap: provider
                .cooldown_seconds
                .map_or(base.backoff_cap, Duration::from_secs),
            ..base
        }
    }

    /// Backoff after `consecutive_failures` failures: `base ^ n` seconds,
    /// capped.
    #[must_use]
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        let exp = i32::try_from(consecutive_failures).unwrap_or(i32::MAX);
        let secs = self.backoff_base.powi(exp);
        if !secs.is_finite() || secs < 0.0 {
            return self.backoff_cap;
        }
        Duration::try_from_secs_f64(secs).map_or(self.backoff_cap, |d| d.min(self.backoff_cap))
    }
}

/// What a recorded failure did to the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    /// Streak length after this failure.
    pub consecutive_failures: u32,
    /// Cooldown applied by this failure, if any.
    pub cooldown: Option<Duration>,
    /// True when the cooldown came from a throttling signal.
    pub rate_limited: bool,
}

/// Mutable health of one provider.
///
/// `status` is derived, never stored: it is a pure function of the failure
/// streak, `backoff_until`, and the time it is asked about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakerState {
    consecutive_failures: u32,
    total_requests: u64,
    successful_requests: u64,
    last_success: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    last_failure_at: Option<Instant>,
    backoff_until: Option<Instant>,
    last_used: Option<Instant>,
}

impl BreakerState {
    /// Fresh ACTIVE state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful call.
    pub fn record_success(&mut self) {
        self.record_success_at(Instant::now());
    }

    /// Record a successful call observed at `now`.
    pub fn record_success_at(&mut self, now: Instant) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.backoff_until = None;
        self.last_success = Some(Utc::now());
        self.last_used = Some(now);
    }

    /// Record a failed call.
    pub fn record_failure(&mut self, kind: FailureKind, policy: &BreakerPolicy) -> FailureOutcome {
        self.record_failure_at(Instant::now(), kind, policy)
    }

    /// Record a failed call observed at `now`.
    ///
    /// Once the streak reaches the threshold the breaker opens for
    /// `policy.backoff(streak)`. A `RateLimit` failure opens it for at least
    /// `policy.rate_limit_cooldown` regardless of the streak. `backoff_until`
    /// only ever moves forward.
    pub fn record_failure_at(
        &mut self,
        now: Instant,
        kind: FailureKind,
        policy: &BreakerPolicy,
    ) -> FailureOutcome {
        self.total_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(Utc::now());
        self.last_failure_at = Some(now);
        self.last_used = Some(now);

        let mut cooldown = None;
        if self.consecutive_failures >= policy.max_failures {
            cooldown = Some(policy.backoff(self.consecutive_failures));
        }
        let rate_limited = kind == FailureKind::RateLimit;
        if rate_limited {
            cooldown = Some(cooldown.map_or(policy.rate_limit_cooldown, |d| {
                d.max(policy.rate_limit_cooldown)
            }));
        }
        if let Some(d) = cooldown {
            let until = now + d;
            self.backoff_until = Some(self.backoff_until.map_or(until, |prev| prev.max(until)));
        }

        FailureOutcome {
            consecutive_failures: self.consecutive_failures,
            cooldown,
            rate_limited,
        }
    }

    /// Operator reset: clears the streak and any cooldown, keeps counters.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.backoff_until = None;
    }

    /// Note that the router picked this provider at `now`.
    pub fn mark_used(&mut self, now: Instant) {
        self.last_used = Some(now);
    }

    /// True iff `now >= backoff_until`.
    #[must_use]
    pub fn is_available_at(&self, now: Instant) -> bool {
        self.backoff_until.is_none_or(|until| now >= until)
    }

    /// Availability right now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    /// Circuit state at `now`.
    ///
    /// A provider whose cooldown has elapsed reads as ACTIVE (probationary)
    /// until the next recorded outcome.
    #[must_use]
    pub fn status_at(&self, now: Instant) -> ProviderStatus {
        match self.backoff_until {
            Some(until) if now < until => ProviderStatus::Cooldown,
            Some(_) => ProviderStatus::Active,
            None if self.consecutive_failures > 0 => ProviderStatus::Degraded,
            None => ProviderStatus::Active,
        }
    }

    /// Time left in the current cooldown.
    #[must_use]
    pub fn backoff_remaining(&self, now: Instant) -> Duration {
        self.backoff_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    /// Percentage of successful requests; 100 before any request.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.successful_requests as f64 / self.total_requests as f64 * 100.0;
        rate.clamp(0.0, 100.0)
    }

    /// Tie-break score among same-priority providers; lower is better.
    #[must_use]
    pub fn health_score(&self, policy: &BreakerPolicy) -> f64 {
        (100.0 - self.success_rate())
            + policy.failure_penalty * f64::from(self.consecutive_failures)
    }

    /// Current failure streak.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Total recorded calls.
    #[must_use]
    pub const fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Recorded successes.
    #[must_use]
    pub const fn successful_requests(&self) -> u64 {
        self.successful_requests
    }

    /// Recorded failures.
    #[must_use]
    pub const fn failed_requests(&self) -> u64 {
        self.total_requests - self.successful_requests
    }

    /// Wall-clock time of the last success.
    #[must_use]
    pub const fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Wall-clock time of the last failure.
    #[must_use]
    pub const fn last_failure(&self) -> Option<DateTime<Utc>> {
        self.last_failure
    }

    /// Monotonic time of the last failure.
    #[must_use]
    pub const fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }

    /// End of the current (or last) cooldown.
    #[must_use]
    pub const fn backoff_until(&self) -> Option<Instant> {
        self.backoff_until
    }

    /// When the router last picked this provider.
    #[must_use]
    pub const fn last_used(&self) -> Option<Instant> {
        self.last_used
    }
}
