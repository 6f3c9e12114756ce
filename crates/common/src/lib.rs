pub mod config;
pub mod error;
pub mod feed;
pub mod notify;
pub mod store;
pub mod types;

pub use config::{Config, FeedConfig, TrackerConfig};
pub use error::{Error, Result};
pub use feed::MarketDataFeed;
pub use notify::{Notifier, SubscriberSource};
pub use store::PriceEventStore;
pub use types::*;
