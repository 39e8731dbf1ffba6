//! Feedgate-specific data transfer objects, configuration primitives and the
//! provider failure taxonomy.
#![warn(missing_docs)]

mod category;
mod config;
mod error;
mod params;
mod report;

pub use category::Category;
pub use config::{
    BreakerConfig, CacheConfig, FeedgateConfig, ProbeConfig, ProviderConfig, RateLimitType,
};
pub use error::{FailureKind, FeedError, FetchError};
pub use params::Params;
pub use report::{
    AttemptOutcome, AttemptRecord, CategoryStatus, FetchReport, HealthCheckResult,
    ProbeStatus, ProviderHealthSnapshot, ProviderStatus, RateLimitSnapshot, StatusReport,
};
