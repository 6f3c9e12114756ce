use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network, HTTP status or timeout failure talking to the market-data feed.
    #[error("Market data fetch failed: {0}")]
    Fetch(String),

    /// Feed answered but the payload could not be turned into candles.
    #[error("Malformed kline payload: {0}")]
    Parse(String),

    #[error("Insufficient data: need {required} candles, got {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Delivery to subscriber {subscriber_id} failed: {reason}")]
    Delivery { subscriber_id: i64, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// User-supplied value rejected before it reached storage.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures expected to clear up on the next polling cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Parse(_) | Error::InsufficientData { .. } | Error::Delivery { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
