use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FeedError;

/// Logical data category a provider serves.
///
/// Each category is routed independently: providers registered for `News`
/// are never consulted for `Ohlcv` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Category {
    /// Spot prices and ticker snapshots.
    MarketPrice,
    /// Candles (open/high/low/close/volume).
    Ohlcv,
    /// News articles and headlines.
    News,
    /// Sentiment indices and social signals.
    Sentiment,
    /// On-chain metrics and explorer data.
    OnChain,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MarketPrice,
        Self::Ohlcv,
        Self::News,
        Self::Sentiment,
        Self::OnChain,
    ];

    /// Stable, snake-case identifier for logs, cache keys and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketPrice => "market_price",
            Self::Ohlcv => "ohlcv",
            Self::News => "news",
            Self::Sentiment => "sentiment",
            Self::OnChain => "on_chain",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| FeedError::UnknownCategory {
                category: s.to_string(),
            })
    }
}
