use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use feedgate_core::{BreakerState, Provider};
use feedgate_middleware::RateLimiter;
use feedgate_types::AttemptRecord;

/// Ordered candidates for one routed call.
#[derive(Debug, Default)]
pub(super) struct Plan {
    /// Providers to call, in order.
    pub(super) candidates: Vec<Arc<Provider>>,
    /// Providers excluded up front, with the reason.
    pub(super) skipped: Vec<AttemptRecord>,
    /// True when every provider was filtered out by its breaker and the
    /// least recently failed one was admitted anyway.
    pub(super) best_effort: bool,
}

struct Ranked {
    provider: Arc<Provider>,
    state: BreakerState,
    score: f64,
    order: usize,
}

// Never-used sorts first, then oldest use.
fn cmp_last_used(a: Option<Instant>, b: Option<Instant>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

/// Sort by priority, then health score, then least recently used, then
/// registration order.
fn rank(providers: &[Arc<Provider>]) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = providers
        .iter()
        .enumerate()
        .map(|(order, p)| {
            let state = p.state();
            Ranked {
                score: state.health_score(p.policy()),
                provider: Arc::clone(p),
                state,
                order,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.provider
            .priority()
            .cmp(&b.provider.priority())
            .then_with(|| a.score.total_cmp(&b.score))
            .then_with(|| cmp_last_used(a.state.last_used(), b.state.last_used()))
            .then_with(|| a.order.cmp(&b.order))
    });
    ranked
}

pub(super) fn plan(providers: &[Arc<Provider>], limiter: &RateLimiter, now: Instant) -> Plan {
    let mut out = Plan::default();
    // Breaker-blocked providers the limiter would still admit.
    let mut cooling: Vec<Ranked> = Vec::new();

    for r in rank(providers) {
        let name = r.provider.name();
        if let Err(e) = limiter.can_make_request_at(name, now) {
            out.skipped.push(AttemptRecord::skipped(name, e.to_string()));
            continue;
        }
        if !r.state.is_available_at(now) {
            let remaining = r.state.backoff_remaining(now);
            out.skipped.push(AttemptRecord::skipped(
                name,
                format!("in cooldown for another {}ms", remaining.as_millis()),
            ));
            cooling.push(r);
            continue;
        }
        out.candidates.push(r.provider);
    }

    if out.candidates.is_empty()
        && let Some(pick) = least_recently_failed(cooling)
    {
        out.skipped.retain(|a| a.provider != pick.name());
        out.candidates.push(pick);
        out.best_effort = true;
    }
    out
}

// A provider that never failed counts as the least recently failed.
fn least_recently_failed(cooling: Vec<Ranked>) -> Option<Arc<Provider>> {
    cooling
        .into_iter()
        .min_by(|a, b| {
            cmp_last_used(a.state.last_failure_at(), b.state.last_failure_at())
                .then_with(|| a.order.cmp(&b.order))
        })
        .map(|r| r.provider)
}
