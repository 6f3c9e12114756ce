use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::PsarParams;

/// Tuning for the PSAR/RSI/SMA signal evaluator.
///
/// Every field has a default, so the file may override only what it needs.
///
/// Example `config/signal.toml`:
/// ```toml
/// rsi_period = 60
/// rsi_buy_zone = [35.0, 43.0]
///
/// [psar]
/// init_af = 0.03
/// max_af = 0.1
/// af_step = 0.00265
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub sma_trend: usize,
    pub rsi_period: usize,
    pub psar: PsarParams,

    /// Inclusive RSI band that arms a long entry.
    pub rsi_buy_zone: (f64, f64),
    /// RSI at or above which the long arm is released.
    pub rsi_sell_floor: f64,

    /// Inclusive band for the fast-vs-slow SMA gap, in percent.
    pub sma_spread_band: (f64, f64),
    /// Minimum fast-vs-trend SMA gap, in percent.
    pub sma_trend_spread_min: f64,

    /// Required drop of RSI below the top pivot, in percent of the pivot.
    pub long_divergence_pct: f64,
    /// Required rise of RSI above the bottom pivot, in percent of the pivot.
    pub short_divergence_pct: f64,

    // Starting values of the per-evaluation RSI memory.
    pub initial_prev_rsi: f64,
    pub initial_pivot_bottom: f64,
    pub initial_pivot_top: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            sma_fast: 9,
            sma_slow: 21,
            sma_trend: 200,
            rsi_period: 60,
            psar: PsarParams::default(),
            rsi_buy_zone: (35.0, 43.0),
            rsi_sell_floor: 53.0,
            sma_spread_band: (0.1, 0.2),
            sma_trend_spread_min: 0.3,
            long_divergence_pct: 25.0,
            short_divergence_pct: 35.0,
            initial_prev_rsi: 1.0,
            initial_pivot_bottom: 1.0,
            initial_pivot_top: 53.0,
        }
    }
}

impl EvaluatorConfig {
    /// Load from a TOML file, falling back to defaults when the file is absent.
    /// Exits process on a file that exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No signal config file, using defaults");
            return Self::default();
        }
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("Failed to read signal config at '{}': {e}", path.display())
        });
        toml::from_str(&content).unwrap_or_else(|e| {
            panic!("Failed to parse signal config at '{}': {e}", path.display())
        })
    }

    /// Smallest window for which every indicator has a value on the last candle.
    pub fn required_candles(&self) -> usize {
        self.sma_fast
            .max(self.sma_slow)
            .max(self.sma_trend)
            .max(self.rsi_period + 1)
            .max(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_a_full_two_hundred_candle_window() {
        assert_eq!(EvaluatorConfig::default().required_candles(), 200);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let cfg: EvaluatorConfig = toml::from_str(
            r#"
            rsi_period = 14
            rsi_buy_zone = [30.0, 40.0]

            [psar]
            max_af = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rsi_period, 14);
        assert_eq!(cfg.rsi_buy_zone, (30.0, 40.0));
        assert_eq!(cfg.psar.max_af, 0.2);
        assert_eq!(cfg.psar.init_af, 0.03);
        assert_eq!(cfg.sma_trend, 200);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = EvaluatorConfig::load("does/not/exist/signal.toml");
        assert_eq!(cfg, EvaluatorConfig::default());
    }
}
