use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use feedgate_core::{BreakerPolicy, Fetcher, HealthSink, Provider, ProviderRegistry};
use feedgate_middleware::{RateLimiter, TtlCache};
use feedgate_types::{
    BreakerConfig, CacheConfig, Category, FeedError, FeedgateConfig, FetchError, ProbeConfig,
    ProviderConfig,
};

use crate::probe::HealthProbe;
use crate::router::CachedResult;

/// Orchestrator that routes requests across registered providers.
pub struct Feedgate {
    pub(crate) registry: Arc<ProviderRegistry>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) cache: Option<TtlCache<CachedResult>>,
    pub(crate) provider_timeout: Duration,
    pub(crate) probe_cfg: ProbeConfig,
}

impl std::fmt::Debug for Feedgate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feedgate")
            .field("providers", &self.registry.len())
            .field("provider_timeout", &self.provider_timeout)
            .field("cache", &self.cache.as_ref().map(TtlCache::ttl))
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a `Feedgate` with custom configuration.
pub struct FeedgateBuilder {
    providers: Vec<(ProviderConfig, Arc<dyn Fetcher>)>,
    provider_timeout: Duration,
    breaker: BreakerConfig,
    cache: Option<CacheConfig>,
    probe: ProbeConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl std::fmt::Debug for FeedgateBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedgateBuilder")
            .field("providers", &self.providers.len())
            .field("provider_timeout", &self.provider_timeout)
            .field("breaker", &self.breaker)
            .field("cache", &self.cache)
            .field("probe", &self.probe)
            .finish_non_exhaustive()
    }
}

impl Default for FeedgateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedgateBuilder {
    /// Create a new builder with defaults: no providers, a 10s per-call
    /// timeout, the default breaker, no cache.
    #[must_use]
    pub fn new() -> Self {
        let defaults = FeedgateConfig::default();
        Self {
            providers: Vec::new(),
            provider_timeout: defaults.provider_timeout(),
            breaker: defaults.breaker,
            cache: defaults.cache,
            probe: defaults.probe,
            limiter: None,
        }
    }

    /// Pair every configured provider with its adapter, looked up by
    /// provider name.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the document fails validation and
    /// `UnknownProvider` when a configured provider has no adapter.
    pub fn from_config(
        cfg: FeedgateConfig,
        adapters: &HashMap<String, Arc<dyn Fetcher>>,
    ) -> Result<Self, FeedError> {
        cfg.validate()?;
        let mut builder = Self::new()
            .provider_timeout(cfg.provider_timeout())
            .breaker(cfg.breaker)
            .probe(cfg.probe);
        builder.cache = cfg.cache;
        for p in cfg.providers {
            let fetcher = adapters
                .get(&p.name)
                .cloned()
                .ok_or_else(|| FeedError::UnknownProvider {
                    provider: p.name.clone(),
                })?;
            builder.providers.push((p, fetcher));
        }
        Ok(builder)
    }

    /// Register a provider and its adapter.
    ///
    /// Registration order is the final tie-break when priority, health and
    /// recency are all equal.
    #[must_use]
    pub fn with_provider(mut self, cfg: ProviderConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        self.providers.push((cfg, fetcher));
        self
    }

    /// Default per-call timeout for providers without their own.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Shared breaker tuning.
    #[must_use]
    pub const fn breaker(mut self, cfg: BreakerConfig) -> Self {
        self.breaker = cfg;
        self
    }

    /// Enable the result cache.
    #[must_use]
    pub const fn cache(mut self, cfg: CacheConfig) -> Self {
        self.cache = Some(cfg);
        self
    }

    /// Health-probe tuning.
    #[must_use]
    pub const fn probe(mut self, cfg: ProbeConfig) -> Self {
        self.probe = cfg;
        self
    }

    /// Share an existing limiter, e.g. with another process component that
    /// calls the same upstreams.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when no provider is registered or an entry
    /// fails validation, and `DuplicateProvider` when a name repeats within a
    /// category.
    pub fn build(self) -> Result<Feedgate, FeedError> {
        if self.providers.is_empty() {
            return Err(FeedError::InvalidConfig(
                "at least one provider must be registered".to_string(),
            ));
        }
        self.breaker.validate()?;

        let limiter = self.limiter.unwrap_or_default();
        let mut registry = ProviderRegistry::new();
        for (cfg, fetcher) in self.providers {
            cfg.validate()?;
            let policy = BreakerPolicy::for_provider(&self.breaker, &cfg);
            if let Some((limit_type, limit_value)) = cfg.rate_limit_pair() {
                limiter.configure_limit(&cfg.name, limit_type, limit_value);
            }
            registry.register(Provider::new(cfg, policy, fetcher))?;
        }

        Ok(Feedgate {
            registry: Arc::new(registry),
            limiter,
            cache: self.cache.as_ref().and_then(TtlCache::from_config),
            provider_timeout: self.provider_timeout,
            probe_cfg: self.probe,
        })
    }
}

impl Feedgate {
    /// Start building a new `Feedgate`.
    #[must_use]
    pub fn builder() -> FeedgateBuilder {
        FeedgateBuilder::new()
    }

    /// Wrap a provider future with a timeout; expiry becomes a `Timeout`
    /// failure.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "feedgate::core::provider_call_with_timeout",
            skip(fut),
            fields(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        )
    )]
    pub(crate) async fn provider_call_with_timeout<T, Fut>(
        provider: &str,
        timeout: Duration,
        fut: Fut,
    ) -> Result<T, FetchError>
    where
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        (tokio::time::timeout(timeout, fut).await).unwrap_or_else(|_| {
            Err(FetchError::timeout(format!(
                "{provider} timed out after {}ms",
                timeout.as_millis()
            )))
        })
    }

    pub(crate) fn timeout_for(&self, provider: &Provider) -> Duration {
        provider
            .config()
            .timeout_ms
            .map_or(self.provider_timeout, Duration::from_millis)
    }

    /// The provider registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Clear a provider's failure streak and cooldown.
    ///
    /// # Errors
    /// Returns `UnknownProvider` when no provider with this name serves
    /// `category`.
    pub fn reset_provider(&self, category: Category, name: &str) -> Result<(), FeedError> {
        let provider =
            self.registry
                .get(category, name)
                .ok_or_else(|| FeedError::UnknownProvider {
                    provider: name.to_string(),
                })?;
        provider.reset();
        #[cfg(feature = "tracing")]
        tracing::info!(provider = name, category = %category, "provider breaker reset");
        Ok(())
    }

    /// Create a health probe over the same registry and rate limiter.
    #[must_use]
    pub fn health_probe(&self, sink: Arc<dyn HealthSink>) -> Arc<HealthProbe> {
        Arc::new(HealthProbe::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.limiter),
            sink,
            self.probe_cfg,
        ))
    }
}
