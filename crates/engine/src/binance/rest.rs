use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Proxy};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::debug;

use common::{Candle, Error, FeedConfig, MarketDataFeed, Result};

/// Browser user agents rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
];

const KLINE_INTERVAL: &str = "1m";

/// Public-market REST client for Binance 1-minute klines.
///
/// Requests go through the configured proxy, if any, and carry a randomly
/// chosen browser user agent. No request signing is needed for klines.
pub struct BinanceFeed {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl BinanceFeed {
    pub fn new(cfg: &FeedConfig) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls().timeout(cfg.timeout);
        if let Some(proxy) = &cfg.proxy {
            let scheme = proxy.split_once("://").map(|(scheme, _)| scheme);
            if !matches!(scheme, Some("http" | "https")) {
                return Err(Error::Config(format!(
                    "feed proxy '{proxy}' must be an http or https URL"
                )));
            }
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("invalid feed proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            http,
        })
    }
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[async_trait]
impl MarketDataFeed for BinanceFeed {
    async fn recent_candles(&self, pair: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let symbol = pair.to_uppercase();
        let limit = limit.to_string();

        let mut req = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str()),
                ("interval", KLINE_INTERVAL),
                ("limit", limit.as_str()),
            ])
            .header(USER_AGENT, random_user_agent());
        if let Some(key) = &self.api_key {
            req = req.header("X-MBX-APIKEY", key);
        }

        debug!(pair = %symbol, limit = %limit, "Fetching klines");
        let resp = req.send().await.map_err(|e| Error::Fetch(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {status}: {body}")));
        }

        parse_klines(&body)
    }
}

// ─── Kline JSON parsing ──────────────────────────────────────────────────────

/// One row of `/api/v3/klines`: open time, OHLCV as decimal strings, close
/// time, then quote volume, trade count, taker volumes and an unused field.
#[derive(Deserialize)]
struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

/// Parse a klines response body into candles, oldest first.
///
/// Rejects rows that are malformed or not strictly ascending by open time.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<RawKline> =
        serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;

    let mut candles: Vec<Candle> = Vec::with_capacity(rows.len());
    for (i, RawKline(open_ms, open, high, low, close, volume, close_ms, ..)) in
        rows.into_iter().enumerate()
    {
        let candle = Candle {
            open_time: millis(open_ms)?,
            open: price(&open, "open", i)?,
            high: price(&high, "high", i)?,
            low: price(&low, "low", i)?,
            close: price(&close, "close", i)?,
            volume: decimal(&volume, "volume", i)?,
            close_time: millis(close_ms)?,
        };
        if let Some(prev) = candles.last() {
            if candle.open_time <= prev.open_time {
                return Err(Error::Parse(format!(
                    "kline {i} opens at {} which is not after {}",
                    candle.open_time, prev.open_time
                )));
            }
        }
        candles.push(candle);
    }
    Ok(candles)
}

fn decimal(raw: &str, field: &str, row: usize) -> Result<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::Parse(format!("kline {row}: {field} '{raw}' is not a number")))
}

fn price(raw: &str, field: &str, row: usize) -> Result<f64> {
    let value = decimal(raw, field, row)?;
    if value <= 0.0 {
        return Err(Error::Parse(format!("kline {row}: {field} {value} is not positive")));
    }
    Ok(value)
}

fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Parse(format!("timestamp {ms} out of range")))
}
