pub mod config;
pub mod evaluator;
pub mod indicators;

pub use config::EvaluatorConfig;
pub use evaluator::{IndicatorRow, IndicatorSnapshot, SignalEvaluator};

use common::{Candle, Result, Signal};

/// All signal strategies must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Minimum number of candles `evaluate` needs to produce a signal.
    fn required_candles(&self) -> usize;

    /// Evaluate a window of candles (oldest first) and return the advisory
    /// signal for the most recent one.
    fn evaluate(&self, candles: &[Candle]) -> Result<Signal>;
}
