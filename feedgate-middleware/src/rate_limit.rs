//! Per-provider request windows.
//!
//! Windows are keyed by provider name, so two categories served by the same
//! upstream share one budget.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use feedgate_types::{FeedError, RateLimitSnapshot, RateLimitType};

#[derive(Debug)]
struct Window {
    limit_type: RateLimitType,
    limit_value: u32,
    current_usage: u32,
    reset_at: Instant,
    warned: bool,
}

impl Window {
    fn new(limit_type: RateLimitType, limit_value: u32, now: Instant) -> Self {
        Self {
            limit_type,
            limit_value,
            current_usage: 0,
            reset_at: now + limit_type.window(),
            warned: false,
        }
    }

    fn effective_usage(&self, now: Instant) -> u32 {
        if now >= self.reset_at {
            0
        } else {
            self.current_usage
        }
    }

    // Align to whole windows so bursty callers cannot drift the boundary.
    fn roll(&mut self, now: Instant) {
        if now < self.reset_at {
            return;
        }
        let window = self.limit_type.window();
        let passed = now.duration_since(self.reset_at).as_nanos() / window.as_nanos() + 1;
        let offset = Duration::from_nanos(
            (passed * window.as_nanos())
                .try_into()
                .unwrap_or(u64::MAX),
        );
        self.reset_at += offset;
        self.current_usage = 0;
        self.warned = false;
    }

    // A unit taken before the latest roll belongs to an old window.
    fn holds(&self, acquired_at: Instant) -> bool {
        self.reset_at
            .checked_sub(self.limit_type.window())
            .is_none_or(|start| acquired_at >= start)
    }

    fn reset_in(&self, now: Instant) -> Duration {
        if now >= self.reset_at {
            self.limit_type.window()
        } else {
            self.reset_at.duration_since(now)
        }
    }

    fn denial(&self, provider: &str, now: Instant) -> FeedError {
        FeedError::RateLimitExceeded {
            provider: provider.to_string(),
            limit_type: self.limit_type,
            limit: self.limit_value,
            current_usage: self.effective_usage(now),
            reset_in_ms: millis(self.reset_in(now)),
        }
    }

    fn snapshot(&self, now: Instant) -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit_type: self.limit_type,
            limit_value: self.limit_value,
            current_usage: self.effective_usage(now),
            reset_in_ms: millis(self.reset_in(now)),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Tracks request counts per provider against configured windows.
///
/// Providers without a configured window are never limited. Each window has
/// its own lock; no operation holds more than one.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: RwLock<HashMap<String, Arc<Mutex<Window>>>>,
}

impl RateLimiter {
    /// Limiter with no windows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn window(&self, provider: &str) -> Option<Arc<Mutex<Window>>> {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned()
    }

    fn lock(w: &Mutex<Window>) -> MutexGuard<'_, Window> {
        w.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish (or replace) the window for `provider`.
    pub fn configure_limit(&self, provider: &str, limit_type: RateLimitType, limit_value: u32) {
        self.configure_limit_at(provider, limit_type, limit_value, Instant::now());
    }

    /// Establish the window as if configured at `now`.
    pub fn configure_limit_at(
        &self,
        provider: &str,
        limit_type: RateLimitType,
        limit_value: u32,
        now: Instant,
    ) {
        let window = Arc::new(Mutex::new(Window::new(limit_type, limit_value, now)));
        self.windows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider.to_string(), window);
    }

    /// True when `provider` has a window.
    #[must_use]
    pub fn is_configured(&self, provider: &str) -> bool {
        self.window(provider).is_some()
    }

    /// Whether a request to `provider` would be admitted right now.
    ///
    /// # Errors
    /// Returns `FeedError::RateLimitExceeded` describing the exhausted window.
    pub fn can_make_request(&self, provider: &str) -> Result<(), FeedError> {
        self.can_make_request_at(provider, Instant::now())
    }

    /// Admission check at `now`. Never mutates the window: an elapsed window
    /// reads as empty but is only rolled over by `record_request`.
    ///
    /// # Errors
    /// Returns `FeedError::RateLimitExceeded` describing the exhausted window.
    pub fn can_make_request_at(&self, provider: &str, now: Instant) -> Result<(), FeedError> {
        let Some(w) = self.window(provider) else {
            return Ok(());
        };
        let w = Self::lock(&w);
        if w.effective_usage(now) < w.limit_value {
            Ok(())
        } else {
            Err(w.denial(provider, now))
        }
    }

    /// Count one request against `provider`'s budget.
    ///
    /// Unlike `try_acquire` this never refuses: a request made outside the
    /// limiter is still counted, so usage may exceed the limit.
    pub fn record_request(&self, provider: &str) {
        self.record_request_at(provider, Instant::now());
    }

    /// Count one request as of `now`.
    pub fn record_request_at(&self, provider: &str, now: Instant) {
        let Some(w) = self.window(provider) else {
            return;
        };
        let mut w = Self::lock(&w);
        w.roll(now);
        w.current_usage = w.current_usage.saturating_add(1);
        Self::warn_if_hot(provider, &mut w);
    }

    /// Check and consume in one step.
    ///
    /// # Errors
    /// Returns `FeedError::RateLimitExceeded` and consumes nothing when the
    /// window is exhausted.
    pub fn try_acquire(&self, provider: &str) -> Result<(), FeedError> {
        self.try_acquire_at(provider, Instant::now())
    }

    /// Check and consume as of `now`.
    ///
    /// # Errors
    /// Returns `FeedError::RateLimitExceeded` and consumes nothing when the
    /// window is exhausted.
    pub fn try_acquire_at(&self, provider: &str, now: Instant) -> Result<(), FeedError> {
        let Some(w) = self.window(provider) else {
            return Ok(());
        };
        let mut w = Self::lock(&w);
        w.roll(now);
        if w.current_usage >= w.limit_value {
            return Err(w.denial(provider, now));
        }
        w.current_usage += 1;
        Self::warn_if_hot(provider, &mut w);
        Ok(())
    }

    /// Hand back a unit taken by `try_acquire_at(provider, acquired_at)`.
    ///
    /// A no-op when the window has rolled since `acquired_at`.
    pub fn release(&self, provider: &str, acquired_at: Instant) {
        let Some(w) = self.window(provider) else {
            return;
        };
        let mut w = Self::lock(&w);
        if w.holds(acquired_at) {
            w.current_usage = w.current_usage.saturating_sub(1);
        }
    }

    fn warn_if_hot(provider: &str, w: &mut Window) {
        let hot = u64::from(w.current_usage) * 100 >= u64::from(w.limit_value) * 80;
        if hot && !w.warned {
            w.warned = true;
            #[cfg(feature = "tracing")]
            tracing::warn!(
                provider,
                usage = w.current_usage,
                limit = w.limit_value,
                window = %w.limit_type,
                "rate limit utilisation at or above 80%"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = provider;
        }
    }

    /// Current window for `provider`, if configured.
    #[must_use]
    pub fn snapshot(&self, provider: &str) -> Option<RateLimitSnapshot> {
        self.snapshot_at(provider, Instant::now())
    }

    /// Window for `provider` as seen at `now`.
    #[must_use]
    pub fn snapshot_at(&self, provider: &str, now: Instant) -> Option<RateLimitSnapshot> {
        let w = self.window(provider)?;
        let w = Self::lock(&w);
        Some(w.snapshot(now))
    }
}
