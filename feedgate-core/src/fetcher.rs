use async_trait::async_trait;
use serde_json::Value;

use feedgate_types::{FetchError, Params};

/// Outcome of a lightweight health-endpoint call.
///
/// A non-2xx status is a reply, not an error; adapters return `Err` only when
/// no response arrived at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReply {
    /// HTTP status code, when the transport has one.
    pub status_code: Option<u16>,
    /// Endpoint that was exercised.
    pub endpoint: String,
}

impl ProbeReply {
    /// Reply with a status code.
    pub fn new(endpoint: impl Into<String>, status_code: u16) -> Self {
        Self {
            status_code: Some(status_code),
            endpoint: endpoint.into(),
        }
    }

    /// True when there is no status code or it is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.is_none_or(|c| (200..300).contains(&c))
    }
}

/// Capability implemented once per upstream API.
///
/// The router owns retries, timeouts, and breaker bookkeeping; an adapter
/// only performs the call and tags its failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform one call against the upstream.
    async fn fetch(&self, params: &Params) -> Result<Value, FetchError>;

    /// Advertise a health endpoint by returning a usable trait object
    /// reference when supported.
    fn as_probe_target(&self) -> Option<&dyn ProbeTarget> {
        None
    }
}

/// Focused role trait for adapters that expose a cheap health endpoint.
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    /// Call the health endpoint once.
    async fn probe(&self) -> Result<ProbeReply, FetchError>;
}
