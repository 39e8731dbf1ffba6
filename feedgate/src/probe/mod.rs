//! Out-of-band health probing.

mod classify;
mod pacing;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use feedgate_core::{HealthSink, Provider, ProviderRegistry, TaskHandle};
use feedgate_middleware::RateLimiter;
use feedgate_types::{Category, FeedError, HealthCheckResult, ProbeConfig};
use tokio::sync::watch;

use classify::{OfflineStreak, ProbeOutcome, classify};
use pacing::next_cycle_in;

#[derive(Debug, Default)]
struct Memory {
    streak: OfflineStreak,
    latest: Option<HealthCheckResult>,
}

/// Periodic prober that classifies providers ONLINE, DEGRADED or OFFLINE.
///
/// It never touches breaker state; its output goes to the `HealthSink` and
/// to `latest`. Probes go through the shared `RateLimiter`, so a provider
/// whose window is exhausted is not probed.
pub struct HealthProbe {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    sink: Arc<dyn HealthSink>,
    cfg: ProbeConfig,
    memory: Mutex<HashMap<(Category, String), Memory>>,
}

impl std::fmt::Debug for HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe")
            .field("providers", &self.registry.len())
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl HealthProbe {
    /// Probe over a registry, sharing `limiter` with the request path.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        sink: Arc<dyn HealthSink>,
        cfg: ProbeConfig,
    ) -> Self {
        Self {
            registry,
            limiter,
            sink,
            cfg,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Last result recorded for a provider.
    #[must_use]
    pub fn latest(&self, category: Category, name: &str) -> Option<HealthCheckResult> {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(category, name.to_string()))
            .and_then(|m| m.latest.clone())
    }

    /// Probe one provider now.
    ///
    /// Returns `Ok(None)` when the provider exposes no health endpoint or the
    /// rate limiter denies the probe.
    ///
    /// # Errors
    /// Returns `UnknownProvider` when no provider with this name serves
    /// `category`.
    pub async fn probe_provider(
        &self,
        category: Category,
        name: &str,
    ) -> Result<Option<HealthCheckResult>, FeedError> {
        let provider =
            self.registry
                .get(category, name)
                .ok_or_else(|| FeedError::UnknownProvider {
                    provider: name.to_string(),
                })?;
        Ok(self.probe_one(provider).await)
    }

    /// Probe every registered provider once, `stagger` apart.
    pub async fn run_cycle(&self) -> Vec<HealthCheckResult> {
        self.cycle(None).await
    }

    /// Start the periodic loop.
    ///
    /// `TaskHandle::stop` stops scheduling new probes, lets the one in flight
    /// finish, and then joins the loop.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> TaskHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            #[cfg(feature = "tracing")]
            tracing::info!(
                providers = self.registry.len(),
                interval_ms = self.cfg.interval_ms,
                "health probe started"
            );
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                self.cycle(Some(&stop_rx)).await;
                let wait = next_cycle_in(self.cfg.interval(), self.cfg.jitter_percent);
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    () = tokio::time::sleep(wait) => {}
                }
            }
            #[cfg(feature = "tracing")]
            tracing::info!("health probe stopped");
        });
        TaskHandle::new(join, stop_tx)
    }

    async fn cycle(&self, stop: Option<&watch::Receiver<bool>>) -> Vec<HealthCheckResult> {
        let stopped = || stop.is_some_and(|rx| *rx.borrow());
        let mut out = Vec::new();
        for (i, provider) in self.registry.iter().enumerate() {
            if i > 0 && !self.cfg.stagger().is_zero() {
                tokio::time::sleep(self.cfg.stagger()).await;
            }
            if stopped() {
                break;
            }
            if let Some(result) = self.probe_one(provider).await {
                out.push(result);
            }
        }
        out
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "feedgate::probe::probe_one",
            skip(self, provider),
            fields(provider = provider.name(), category = %provider.category()),
        )
    )]
    async fn probe_one(&self, provider: &Provider) -> Option<HealthCheckResult> {
        let Some(target) = provider.fetcher().as_probe_target() else {
            #[cfg(feature = "tracing")]
            tracing::debug!("no health endpoint; skipping");
            return None;
        };
        if let Err(_e) = self.limiter.try_acquire(provider.name()) {
            #[cfg(feature = "tracing")]
            tracing::debug!(reason = %_e, "probe skipped by rate limiter");
            return None;
        }

        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.cfg.timeout(), target.probe()).await {
            Ok(Ok(reply)) => ProbeOutcome::Reply(reply),
            Ok(Err(e)) => ProbeOutcome::Failed(e),
            Err(_) => ProbeOutcome::TimedOut,
        };
        let elapsed = start.elapsed();
        let raw = classify(&outcome, elapsed, &self.cfg);

        let key = (provider.category(), provider.name().to_string());
        let (status, forced) = {
            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            memory
                .entry(key.clone())
                .or_default()
                .streak
                .apply(raw, self.cfg.offline_streak)
        };

        let endpoint_tested = match &outcome {
            ProbeOutcome::Reply(r) => r.endpoint.clone(),
            _ => provider.name().to_string(),
        };
        let result = HealthCheckResult {
            provider_name: provider.name().to_string(),
            category: provider.category(),
            status,
            response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            status_code: outcome.status_code(),
            error_message: outcome.error_message(self.cfg.timeout()),
            timestamp: Utc::now(),
            endpoint_tested,
        };

        #[cfg(feature = "tracing")]
        {
            if forced {
                tracing::warn!(raw = %raw, "provider pinned OFFLINE by consecutive failed probes");
            }
            tracing::debug!(
                status = %result.status,
                response_time_ms = result.response_time_ms,
                status_code = result.status_code,
                "probe complete"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = forced;

        if let Err(_e) = self.sink.record(&result).await {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, "health sink rejected probe record");
        }

        if let Some(m) = self
            .memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&key)
        {
            m.latest = Some(result.clone());
        }
        Some(result)
    }
}
