use async_trait::async_trait;

use crate::{Candle, Result};

/// Source of recent OHLCV candles for a pair.
///
/// `BinanceFeed` in `crates/engine` implements this against the public klines
/// endpoint; tests substitute a fixture-backed stub.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Fetch the `limit` most recent 1-minute candles, oldest first.
    async fn recent_candles(&self, pair: &str, limit: usize) -> Result<Vec<Candle>>;
}
