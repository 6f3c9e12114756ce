use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{PriceEvent, Result};

/// Append-only log of announced price moves, one stream per pair.
///
/// Implementations must lowercase `pair` on both read and write.
#[async_trait]
pub trait PriceEventStore: Send + Sync {
    /// Most recently recorded event for the pair, if any.
    async fn last_event(&self, pair: &str) -> Result<Option<PriceEvent>>;

    /// Append a new event. Each call is a single atomic insert.
    async fn record(&self, pair: &str, price: f64, at: DateTime<Utc>) -> Result<PriceEvent>;
}
