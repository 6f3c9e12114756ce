pub mod psar;
pub mod rsi;
pub mod sma;

pub use psar::{psar_series, PsarParams, PsarState, Trend};
pub use rsi::RsiIndicator;
pub use sma::sma_series;
