use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub admin_ids: Vec<i64>,

    // Database
    pub database_url: String,

    // Tracking
    pub trading_pair: String,
    pub poll_interval: Duration,
    pub price_change_threshold_pct: f64,
    pub rate_limit_window: chrono::Duration,
    pub request_timeout: Duration,

    // Market data feed
    pub feed_base_url: String,
    pub feed_proxy: Option<String>,
    pub feed_api_key: Option<String>,

    // Signal tuning file path
    pub signal_config_path: String,
}

/// Settings the tracking loop is constructed with.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Symbol as the feed expects it, e.g. "ETHUSDT".
    pub pair: String,
    /// Number of candles requested per iteration.
    pub window: usize,
    /// How many candles back counts as "one hour ago" for 1-minute candles.
    pub hour_ago_offset: usize,
    pub poll_interval: Duration,
    /// Minimum percent move before the rate limiter is even consulted.
    pub price_change_threshold_pct: f64,
    /// Minimum age of the last recorded event before a new one may be written.
    pub rate_limit_window: chrono::Duration,
    /// Upper bound on a single feed request or notification send.
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pair: "ETHUSDT".to_string(),
            window: 200,
            hour_ago_offset: 60,
            poll_interval: Duration::from_millis(500),
            price_change_threshold_pct: 1.0,
            rate_limit_window: chrono::Duration::minutes(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Settings for the HTTP market-data client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub proxy: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            proxy: None,
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).unwrap_or_else(|| {
                panic!("Required environment variable '{key}' is not set. Check your .env file.")
            })
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let admin_ids = optional("ADMIN_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<i64>().unwrap_or_else(|_| {
                            panic!("ADMIN_IDS contains non-numeric ID: '{s}'")
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let defaults = TrackerConfig::default();
        let feed_defaults = FeedConfig::default();

        Config {
            telegram_token: required("TELEGRAM_TOKEN"),
            admin_ids,
            database_url: required("DATABASE_URL"),
            trading_pair: optional("TRADING_PAIR")
                .map(|p| p.to_uppercase())
                .unwrap_or(defaults.pair),
            poll_interval: parsed("POLL_INTERVAL_MS", &optional)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            price_change_threshold_pct: parsed("PRICE_CHANGE_THRESHOLD_PCT", &optional)
                .unwrap_or(defaults.price_change_threshold_pct),
            rate_limit_window: parsed("RATE_LIMIT_MINUTES", &optional)
                .map(chrono::Duration::minutes)
                .unwrap_or(defaults.rate_limit_window),
            request_timeout: parsed("REQUEST_TIMEOUT_SECS", &optional)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            feed_base_url: optional("FEED_BASE_URL").unwrap_or(feed_defaults.base_url),
            feed_proxy: optional("FEED_PROXY"),
            feed_api_key: optional("FEED_API_KEY"),
            signal_config_path: optional("SIGNAL_CONFIG_PATH")
                .unwrap_or_else(|| "config/signal.toml".to_string()),
        }
    }

    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            pair: self.trading_pair.clone(),
            poll_interval: self.poll_interval,
            price_change_threshold_pct: self.price_change_threshold_pct,
            rate_limit_window: self.rate_limit_window,
            request_timeout: self.request_timeout,
            ..TrackerConfig::default()
        }
    }

    pub fn feed(&self) -> FeedConfig {
        FeedConfig {
            base_url: self.feed_base_url.clone(),
            proxy: self.feed_proxy.clone(),
            api_key: self.feed_api_key.clone(),
            timeout: self.request_timeout,
        }
    }
}

/// Parse an optional numeric variable. Malformed values are logged and ignored.
fn parsed<T: FromStr>(key: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring malformed environment variable, using default");
            None
        }
    }
}
