mod fallback;
mod plan;
mod status;

use serde_json::Value;

/// What the cache keeps for a successful call.
#[derive(Debug, Clone)]
pub(crate) struct CachedResult {
    pub(crate) data: Value,
    pub(crate) provider: String,
}
