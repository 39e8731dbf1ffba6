use std::time::{Duration, Instant};

use chrono::Utc;
use feedgate_middleware::cache_key;
use feedgate_types::{AttemptRecord, Category, FeedError, FetchReport, Params};

use super::CachedResult;
use super::plan::plan;
use crate::core::Feedgate;

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Feedgate {
    /// Fetch `category` data from the first provider that succeeds.
    ///
    /// Behavior:
    /// - A cache hit returns immediately with `cached = true` and no attempts.
    /// - Otherwise providers are tried one at a time in priority, health and
    ///   recency order under a per-call timeout, stopping at the first
    ///   success. A successful first candidate yields exactly one attempt.
    /// - Providers cooling down or over their rate limit are skipped. If the
    ///   breaker filters out everyone, the least recently failed provider is
    ///   tried anyway.
    /// - Each call takes one unit of the provider's rate limit just before it
    ///   starts; a failed call hands the unit back. A provider whose window
    ///   fills up while the call is being routed is skipped.
    /// - A local rate-limit denial only skips the provider. Its breaker is
    ///   left untouched; only an upstream throttling error (HTTP 429)
    ///   extends the cooldown.
    /// - On exhaustion the report carries one `failed` entry per provider
    ///   called followed by a `skipped` entry per provider excluded.
    ///
    /// # Errors
    /// Only `UnknownCategory` when nothing is registered for `category`.
    /// Provider failures are reported in the returned `FetchReport`.
    pub async fn fetch_with_fallback(
        &self,
        category: Category,
        params: &Params,
    ) -> Result<FetchReport, FeedError> {
        self.route(category, params, true).await
    }

    /// Like `fetch_with_fallback` but ignores any cached value. A success
    /// still refreshes the cache.
    ///
    /// # Errors
    /// Only `UnknownCategory` when nothing is registered for `category`.
    pub async fn fetch_with_fallback_fresh(
        &self,
        category: Category,
        params: &Params,
    ) -> Result<FetchReport, FeedError> {
        self.route(category, params, false).await
    }

    /// Drop the cached result for one request; returns whether one existed.
    pub async fn invalidate(&self, category: Category, params: &Params) -> bool {
        match &self.cache {
            Some(cache) => cache.invalidate(&cache_key(category, params)).await,
            None => false,
        }
    }

    /// Drop every cached result.
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "feedgate::router::fetch_with_fallback",
            skip(self, params),
            fields(category = %category, params = params.len()),
        )
    )]
    async fn route(
        &self,
        category: Category,
        params: &Params,
        use_cache: bool,
    ) -> Result<FetchReport, FeedError> {
        let providers = self.registry.providers(category)?;
        let key = self.cache.as_ref().map(|_| cache_key(category, params));

        if use_cache
            && let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Some(hit) = cache.get(key).await
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(provider = %hit.provider, "cache hit");
            return Ok(FetchReport {
                category,
                success: true,
                data: Some(hit.data),
                provider: Some(hit.provider),
                attempts: Vec::new(),
                error: None,
                cached: true,
                timestamp: Utc::now(),
            });
        }

        let mut plan = plan(providers, &self.limiter, Instant::now());
        #[cfg(feature = "tracing")]
        if plan.best_effort {
            tracing::warn!(
                provider = plan.candidates.first().map(|p| p.name()),
                "every provider is cooling down; trying the least recently failed"
            );
        }

        let mut attempts = Vec::with_capacity(plan.candidates.len());
        let mut last_error: Option<String> = None;

        for p in &plan.candidates {
            let start = Instant::now();
            if let Err(e) = self.limiter.try_acquire_at(p.name(), start) {
                #[cfg(feature = "tracing")]
                tracing::debug!(provider = p.name(), "rate limit filled while routing");
                plan.skipped.push(AttemptRecord::skipped(p.name(), e.to_string()));
                continue;
            }
            p.mark_used(start);
            let res = Self::provider_call_with_timeout(
                p.name(),
                self.timeout_for(p),
                p.fetcher().fetch(params),
            )
            .await;
            let duration_ms = millis(start.elapsed());

            match res {
                Ok(data) => {
                    p.record_success();
                    attempts.push(AttemptRecord::success(p.name(), duration_ms));
                    #[cfg(feature = "tracing")]
                    tracing::debug!(provider = p.name(), duration_ms, "attempt succeeded");

                    if let (Some(cache), Some(key)) = (&self.cache, key) {
                        cache
                            .set(
                                key,
                                CachedResult {
                                    data: data.clone(),
                                    provider: p.name().to_string(),
                                },
                            )
                            .await;
                    }
                    return Ok(FetchReport {
                        category,
                        success: true,
                        data: Some(data),
                        provider: Some(p.name().to_string()),
                        attempts,
                        error: None,
                        cached: false,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    let kind = e.classify();
                    self.limiter.release(p.name(), start);
                    let outcome = p.record_failure(kind);
                    #[cfg(feature = "tracing")]
                    {
                        tracing::debug!(
                            provider = p.name(),
                            duration_ms,
                            kind = %kind,
                            error = %e.message,
                            "attempt failed"
                        );
                        if outcome.rate_limited {
                            tracing::info!(
                                provider = p.name(),
                                cooldown_ms = outcome.cooldown.map(millis),
                                "upstream throttled; extended cooldown"
                            );
                        } else if let Some(cooldown) = outcome.cooldown {
                            tracing::warn!(
                                provider = p.name(),
                                consecutive_failures = outcome.consecutive_failures,
                                cooldown_ms = millis(cooldown),
                                "provider entered cooldown"
                            );
                        }
                    }
                    #[cfg(not(feature = "tracing"))]
                    let _ = outcome;
                    last_error = Some(e.to_string());
                    attempts.push(AttemptRecord::failed(p.name(), duration_ms, kind, e.message));
                }
            }
        }

        if last_error.is_none() {
            last_error = plan.skipped.last().and_then(|s| s.error.clone());
        }
        attempts.extend(plan.skipped);
        let error = format!(
            "All providers failed: {}",
            last_error.as_deref().unwrap_or("no provider available")
        );
        #[cfg(feature = "tracing")]
        tracing::warn!(attempts = attempts.len(), error = %error, "all providers exhausted");

        Ok(FetchReport {
            category,
            success: false,
            data: None,
            provider: None,
            attempts,
            error: Some(error),
            cached: false,
            timestamp: Utc::now(),
        })
    }
}
