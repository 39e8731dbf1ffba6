use async_trait::async_trait;

use feedgate_types::{FeedError, HealthCheckResult};

/// Destination for probe records (typically a database table).
#[async_trait]
pub trait HealthSink: Send + Sync {
    /// Persist one record.
    ///
    /// # Errors
    /// Returns `FeedError::Sink` when the record could not be stored. The
    /// probe loop logs the error and keeps going.
    async fn record(&self, result: &HealthCheckResult) -> Result<(), FeedError>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl HealthSink for NoopSink {
    async fn record(&self, _result: &HealthCheckResult) -> Result<(), FeedError> {
        Ok(())
    }
}
