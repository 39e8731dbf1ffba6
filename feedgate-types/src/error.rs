use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RateLimitType;

/// Classification of a single provider failure.
///
/// The router pattern-matches on this to decide how hard to back off:
/// `RateLimit` triggers the extended cooldown, everything else follows the
/// exponential schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailureKind {
    /// No response within the per-call budget.
    Timeout,
    /// Credentials rejected (401/403).
    Authentication,
    /// Upstream signalled throttling (429 or a "rate limit" message).
    RateLimit,
    /// Transient upstream failure (5xx).
    #[serde(rename = "server_error")]
    Server,
    /// Anything else.
    Unknown,
}

impl FailureKind {
    /// Stable identifier used in attempt logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Server => "server_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged failure returned by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct FetchError {
    /// Failure classification.
    pub kind: FailureKind,
    /// HTTP status code, when the upstream produced one.
    pub status: Option<u16>,
    /// Human-readable detail.
    pub message: String,
}

impl FetchError {
    /// Build an error with an explicit kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Helper: `Timeout` failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    /// Helper: `Authentication` failure.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Authentication, message)
    }

    /// Helper: `RateLimit` failure.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimit, message)
    }

    /// Helper: `Server` failure.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Server, message)
    }

    /// Helper: `Unknown` failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Map an HTTP status code onto the failure taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => FailureKind::Authentication,
            408 => FailureKind::Timeout,
            429 => FailureKind::RateLimit,
            500..=599 => FailureKind::Server,
            _ => FailureKind::Unknown,
        };
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Attach an HTTP status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Refine an `Unknown` classification by looking for well-known
    /// signatures in the status code and message.
    ///
    /// Explicit kinds set by the adapter are trusted and returned unchanged,
    /// with one exception: a 429 status always means `RateLimit`.
    #[must_use]
    pub fn classify(&self) -> FailureKind {
        if self.status == Some(429) {
            return FailureKind::RateLimit;
        }
        if self.kind != FailureKind::Unknown {
            return self.kind;
        }
        if let Some(status) = self.status {
            let by_status = Self::from_status(status, String::new()).kind;
            if by_status != FailureKind::Unknown {
                return by_status;
            }
        }
        let m = self.message.to_ascii_lowercase();
        if m.contains("rate limit") || m.contains("ratelimit") || m.contains("too many requests")
        {
            FailureKind::RateLimit
        } else if m.contains("unauthorized") || m.contains("forbidden") || m.contains("api key")
        {
            FailureKind::Authentication
        } else if m.contains("timed out") || m.contains("timeout") {
            FailureKind::Timeout
        } else {
            FailureKind::Unknown
        }
    }
}

/// Caller-visible error for configuration and infrastructure problems.
///
/// Provider failures never surface through this type from the router; they
/// are folded into the returned report instead.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeedError {
    /// No providers are registered for the requested category.
    #[error("unknown category: {category}")]
    UnknownCategory {
        /// Category that was requested.
        category: String,
    },

    /// A provider name did not resolve.
    #[error("unknown provider: {provider}")]
    UnknownProvider {
        /// Provider name that was requested.
        provider: String,
    },

    /// The same provider name was registered twice within a category.
    #[error("duplicate provider '{provider}' in category {category}")]
    DuplicateProvider {
        /// Category of the duplicate registration.
        category: String,
        /// Offending provider name.
        provider: String,
    },

    /// Static configuration is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The local rate limiter denied a request.
    #[error(
        "rate limit exceeded for {provider}: {current_usage}/{limit} {limit_type}, resets in {reset_in_ms}ms"
    )]
    RateLimitExceeded {
        /// Provider whose window is exhausted.
        provider: String,
        /// Window type.
        limit_type: RateLimitType,
        /// Configured limit for the window.
        limit: u32,
        /// Usage recorded in the current window.
        current_usage: u32,
        /// Milliseconds until the window resets.
        reset_in_ms: u64,
    },

    /// The persistence collaborator rejected a record.
    #[error("sink error: {0}")]
    Sink(String),
}

impl FeedError {
    /// True for errors that are fatal to the caller and must not be retried.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory { .. }
                | Self::UnknownProvider { .. }
                | Self::DuplicateProvider { .. }
                | Self::InvalidConfig(_)
        )
    }
}
