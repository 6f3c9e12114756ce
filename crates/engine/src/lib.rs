pub mod announce;
pub mod binance;
pub mod lifecycle;
pub mod ops;

pub use announce::{announce, recipients};
pub use binance::BinanceFeed;
pub use lifecycle::{price_stats, rate_limit_allows, TickOutcome, Tracker, TrackerHandle};
pub use ops::logged;
