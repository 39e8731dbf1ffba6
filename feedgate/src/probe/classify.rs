use std::time::Duration;

use feedgate_core::ProbeReply;
use feedgate_types::{FetchError, ProbeConfig, ProbeStatus};

/// Raw outcome of one probe call.
#[derive(Debug)]
pub(crate) enum ProbeOutcome {
    Reply(ProbeReply),
    Failed(FetchError),
    TimedOut,
}

impl ProbeOutcome {
    pub(crate) fn status_code(&self) -> Option<u16> {
        match self {
            Self::Reply(r) => r.status_code,
            Self::Failed(e) => e.status,
            Self::TimedOut => None,
        }
    }

    pub(crate) fn error_message(&self, budget: Duration) -> Option<String> {
        match self {
            Self::Reply(r) if r.is_success() => None,
            Self::Reply(r) => r.status_code.map(|c| format!("HTTP {c}")),
            Self::Failed(e) => Some(e.to_string()),
            Self::TimedOut => Some(format!("timed out after {}ms", budget.as_millis())),
        }
    }
}

/// Single-probe classification, before the offline streak is applied.
///
/// An adapter error that still carries an HTTP status counts as a non-2xx
/// reply; one without a status is a network failure.
pub(crate) fn classify(outcome: &ProbeOutcome, elapsed: Duration, cfg: &ProbeConfig) -> ProbeStatus {
    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    let ok = match outcome {
        ProbeOutcome::TimedOut => return ProbeStatus::Offline,
        ProbeOutcome::Failed(e) if e.status.is_none() => return ProbeStatus::Offline,
        ProbeOutcome::Failed(_) => false,
        ProbeOutcome::Reply(r) => r.is_success(),
    };
    if ms >= cfg.offline_at_ms {
        ProbeStatus::Offline
    } else if !ok || ms >= cfg.online_below_ms {
        ProbeStatus::Degraded
    } else {
        ProbeStatus::Online
    }
}

/// Secondary breaker over consecutive OFFLINE probes.
///
/// Once `threshold` OFFLINE results have been seen in a row, the next result
/// is reported OFFLINE whatever it was, and only a non-OFFLINE result clears
/// the streak.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OfflineStreak {
    count: u32,
}

impl OfflineStreak {
    /// Fold `raw` into the streak; returns the reported status and whether
    /// it was forced.
    pub(crate) fn apply(&mut self, raw: ProbeStatus, threshold: u32) -> (ProbeStatus, bool) {
        let pinned = threshold > 0 && self.count >= threshold;
        if raw == ProbeStatus::Offline {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        if pinned && raw != ProbeStatus::Offline {
            (ProbeStatus::Offline, true)
        } else {
            (raw, false)
        }
    }

    #[cfg(test)]
    pub(crate) const fn count(self) -> u32 {
        self.count
    }
}
