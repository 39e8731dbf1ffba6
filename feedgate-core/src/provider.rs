use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use feedgate_types::{
    Category, FailureKind, ProviderConfig, ProviderHealthSnapshot, ProviderStatus,
    RateLimitSnapshot,
};

use crate::breaker::{BreakerPolicy, BreakerState, FailureOutcome};
use crate::fetcher::Fetcher;

/// A registered upstream: static identity, its adapter, and mutable health.
///
/// Health lives behind a per-provider lock, so concurrent calls for the same
/// provider never lose updates and no cross-provider locking is needed.
pub struct Provider {
    config: ProviderConfig,
    policy: BreakerPolicy,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<BreakerState>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.config.name)
            .field("category", &self.config.category)
            .field("priority", &self.config.priority)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Pair a configuration entry with its adapter.
    pub fn new(config: ProviderConfig, policy: BreakerPolicy, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            policy,
            fetcher,
            state: Mutex::new(BreakerState::new()),
        }
    }

    // The breaker state is valid after any partial update, so a poisoned lock
    // is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Provider name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Category served.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.config.category
    }

    /// Lower is tried first.
    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.config.priority
    }

    /// Static configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Breaker tuning.
    #[must_use]
    pub const fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// The adapter.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Copy of the current breaker state.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        self.lock().clone()
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        self.lock().record_success_at(Instant::now());
    }

    /// Record a failed call.
    pub fn record_failure(&self, kind: FailureKind) -> FailureOutcome {
        self.record_failure_at(Instant::now(), kind)
    }

    /// Record a failed call observed at `now`.
    pub fn record_failure_at(&self, now: Instant, kind: FailureKind) -> FailureOutcome {
        let outcome = self.lock().record_failure_at(now, kind, &self.policy);
        #[cfg(feature = "tracing")]
        if let Some(cooldown) = outcome.cooldown {
            tracing::debug!(
                provider = self.name(),
                category = %self.category(),
                kind = %kind,
                consecutive_failures = outcome.consecutive_failures,
                cooldown_ms = u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
                "breaker open"
            );
        }
        outcome
    }

    /// Mark the provider as picked at `now`.
    pub fn mark_used(&self, now: Instant) {
        self.lock().mark_used(now);
    }

    /// Clear the failure streak and any cooldown.
    pub fn reset(&self) {
        self.lock().reset();
        #[cfg(feature = "tracing")]
        tracing::debug!(provider = self.name(), category = %self.category(), "breaker reset");
    }

    /// Whether the breaker admits a call right now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.lock().is_available()
    }

    /// Whether the breaker admits a call at `now`.
    #[must_use]
    pub fn is_available_at(&self, now: Instant) -> bool {
        self.lock().is_available_at(now)
    }

    /// Circuit state at `now`.
    #[must_use]
    pub fn status_at(&self, now: Instant) -> ProviderStatus {
        self.lock().status_at(now)
    }

    /// Tie-break score; lower is better.
    #[must_use]
    pub fn health_score(&self) -> f64 {
        self.lock().health_score(&self.policy)
    }

    /// Point-in-time view for dashboards.
    #[must_use]
    pub fn snapshot_at(
        &self,
        now: Instant,
        rate_limit: Option<RateLimitSnapshot>,
    ) -> ProviderHealthSnapshot {
        let s = self.lock();
        ProviderHealthSnapshot {
            name: self.config.name.clone(),
            category: self.config.category,
            priority: self.config.priority,
            status: s.status_at(now),
            success_rate: s.success_rate(),
            consecutive_failures: s.consecutive_failures(),
            available: s.is_available_at(now),
            last_success: s.last_success(),
            last_failure: s.last_failure(),
            total_requests: s.total_requests(),
            successful_requests: s.successful_requests(),
            failed_requests: s.failed_requests(),
            backoff_remaining_ms: u64::try_from(s.backoff_remaining(now).as_millis())
                .unwrap_or(u64::MAX),
            health_score: s.health_score(&self.policy),
            rate_limit,
        }
    }
}
