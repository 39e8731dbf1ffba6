use std::time::Instant;

use chrono::Utc;
use feedgate_types::{Category, CategoryStatus, FeedError, ProviderHealthSnapshot, StatusReport};

use crate::core::Feedgate;

impl Feedgate {
    /// Snapshot of every provider, grouped by category.
    #[must_use]
    pub fn get_status(&self) -> StatusReport {
        let now = Instant::now();
        let categories = self
            .registry
            .categories()
            .map(|category| CategoryStatus {
                category,
                providers: self.snapshots(category, now),
            })
            .collect();
        StatusReport {
            generated_at: Utc::now(),
            categories,
        }
    }

    /// Snapshots for one category, in registration order.
    ///
    /// # Errors
    /// Returns `UnknownCategory` when nothing is registered for `category`.
    pub fn get_provider_health(
        &self,
        category: Category,
    ) -> Result<Vec<ProviderHealthSnapshot>, FeedError> {
        self.registry.providers(category)?;
        Ok(self.snapshots(category, Instant::now()))
    }

    fn snapshots(&self, category: Category, now: Instant) -> Vec<ProviderHealthSnapshot> {
        self.registry
            .providers(category)
            .unwrap_or_default()
            .iter()
            .map(|p| p.snapshot_at(now, self.limiter.snapshot_at(p.name(), now)))
            .collect()
    }
}
