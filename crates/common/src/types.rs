use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation for a fixed time bucket (1 minute on Binance).
/// Windows are ordered by `open_time` ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

/// Advisory output of the signal evaluator. Never acted on automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Stay,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Stay => "stay",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price move that was persisted and announced.
/// The log is append-only; the latest row per pair gates the next announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub id: i64,
    /// Always lowercase, e.g. "ethusdt".
    pub pair: String,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Alert threshold applied when a subscriber never set one.
pub const DEFAULT_ALERT_PERCENT: f64 = 1.0;

/// A chat user as seen by the announcer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Telegram user id, also used as the chat id for direct messages.
    pub id: i64,
    /// `None` means the user never changed it; treated as `DEFAULT_ALERT_PERCENT`.
    pub alert_percent: Option<f64>,
    pub notifications_enabled: bool,
}

impl Subscriber {
    pub fn threshold(&self) -> f64 {
        self.alert_percent.unwrap_or(DEFAULT_ALERT_PERCENT)
    }

    /// True if an enabled subscriber should hear about a move of `percent_change`.
    pub fn wants(&self, percent_change: f64) -> bool {
        self.notifications_enabled && percent_change >= self.threshold()
    }
}

/// Close price at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

/// Everything one tracking iteration learned about the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub pair: String,
    pub signal: Signal,
    pub current: PricePoint,
    pub hour_ago: PricePoint,
    /// Absolute move relative to the current price, in percent.
    pub percent_change: f64,
}

/// Payload handed to a `Notifier` for a single subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub pair: String,
    pub price: f64,
    pub signal: Signal,
}

impl From<&PriceStats> for Alert {
    fn from(stats: &PriceStats) -> Self {
        Self {
            pair: stats.pair.clone(),
            price: stats.current.price,
            signal: stats.signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_renders_lowercase() {
        assert_eq!(Signal::Buy.to_string(), "buy");
        assert_eq!(Signal::Sell.to_string(), "sell");
        assert_eq!(Signal::Stay.to_string(), "stay");
        assert_eq!(serde_json::to_string(&Signal::Stay).unwrap(), "\"stay\"");
    }

    #[test]
    fn unset_threshold_falls_back_to_default() {
        let sub = Subscriber {
            id: 1,
            alert_percent: None,
            notifications_enabled: true,
        };
        assert_eq!(sub.threshold(), DEFAULT_ALERT_PERCENT);
        assert!(sub.wants(1.0));
        assert!(!sub.wants(0.99));
    }

    #[test]
    fn disabled_subscriber_never_wants_alerts() {
        let sub = Subscriber {
            id: 2,
            alert_percent: Some(0.0),
            notifications_enabled: false,
        };
        assert!(!sub.wants(50.0));
    }
}
