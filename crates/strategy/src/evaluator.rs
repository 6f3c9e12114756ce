use serde::Serialize;
use tracing::debug;

use common::{Candle, Error, Result, Signal};

use crate::config::EvaluatorConfig;
use crate::indicators::{psar_series, sma_series, RsiIndicator};
use crate::Strategy;

/// Indicator values on the latest candle that has all of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRow {
    pub close: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub sma_trend: f64,
    pub rsi: f64,
    pub psar: f64,
}

/// The evaluated row with every intermediate flag, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub row: IndicatorRow,
    /// RSI sits in the buy zone.
    pub rsi_indicator: bool,
    /// Fast SMA is slightly under the slow one and clearly under the trend one.
    pub spread_between_sma: bool,
    /// RSI has fallen far enough below the top pivot.
    pub rsi_diff_l: bool,
    /// RSI has risen far enough above the bottom pivot. Always `Some` once computed.
    pub rsi_diff_s: Option<bool>,
    /// Fast SMA at or below slow SMA.
    pub fast_below_slow: bool,
    pub pivot_top: f64,
    pub pivot_bottom: f64,
    pub signal: Signal,
}

/// Combines PSAR, RSI and the 9/21/200 SMAs into a buy/sell/stay call on
/// the most recent candle.
///
/// All indicator state is rebuilt on every call; nothing carries over
/// between evaluations, including the RSI pivots.
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    cfg: EvaluatorConfig,
}

impl SignalEvaluator {
    pub fn new(cfg: EvaluatorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.cfg
    }

    /// Compute all indicators over `candles` (oldest first) and judge the last
    /// complete row.
    pub fn snapshot(&self, candles: &[Candle]) -> Result<IndicatorSnapshot> {
        let required = self.cfg.required_candles();
        let insufficient = || Error::InsufficientData {
            required,
            available: candles.len(),
        };
        if candles.len() < required {
            return Err(insufficient());
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let fast = sma_series(&closes, self.cfg.sma_fast);
        let slow = sma_series(&closes, self.cfg.sma_slow);
        let trend = sma_series(&closes, self.cfg.sma_trend);
        let rsi = RsiIndicator::new(self.cfg.rsi_period).series(&closes);
        let psar = psar_series(self.cfg.psar, candles.iter().map(|c| (c.high, c.low)));

        let row = (0..candles.len())
            .rev()
            .find_map(|i| {
                Some(IndicatorRow {
                    close: closes[i],
                    sma_fast: fast[i]?,
                    sma_slow: slow[i]?,
                    sma_trend: trend[i]?,
                    rsi: rsi[i]?,
                    psar: psar[i]?,
                })
            })
            .ok_or_else(insufficient)?;

        Ok(self.judge(row))
    }

    /// Apply the decision rule to a single indicator row.
    pub fn judge(&self, row: IndicatorRow) -> IndicatorSnapshot {
        let cfg = &self.cfg;
        let rsi = row.rsi;

        // Per-evaluation memory; reset on every call.
        let prev_rsi = cfg.initial_prev_rsi;
        let mut pivot_bottom = cfg.initial_pivot_bottom;
        let mut pivot_top = cfg.initial_pivot_top;

        let (zone_low, zone_high) = cfg.rsi_buy_zone;
        let rsi_indicator = if (zone_low..=zone_high).contains(&rsi) {
            if rsi <= prev_rsi {
                pivot_bottom = rsi;
            }
            true
        } else {
            if rsi >= cfg.rsi_sell_floor && rsi >= prev_rsi && rsi >= pivot_top {
                pivot_top = rsi;
            }
            false
        };

        let fast_slow_gap = 100.0 - row.sma_fast / row.sma_slow * 100.0;
        let fast_trend_gap = 100.0 - row.sma_fast / row.sma_trend * 100.0;
        let (band_low, band_high) = cfg.sma_spread_band;
        let spread_between_sma = (band_low..=band_high).contains(&fast_slow_gap)
            && fast_trend_gap >= cfg.sma_trend_spread_min;

        let rsi_diff_l = 100.0 - rsi / pivot_top * 100.0 >= cfg.long_divergence_pct;
        let rsi_diff_s = Some(rsi / pivot_bottom * 100.0 - 100.0 >= cfg.short_divergence_pct);
        let fast_below_slow = row.sma_fast <= row.sma_slow;

        let buy = row.close >= row.sma_slow
            && fast_below_slow
            && rsi_indicator
            && spread_between_sma
            && rsi_diff_l
            && row.close >= row.psar;
        let sell = row.close <= row.sma_slow
            && !fast_below_slow
            && !rsi_indicator
            && rsi_diff_s.is_some();

        let signal = if buy {
            Signal::Buy
        } else if sell {
            Signal::Sell
        } else {
            Signal::Stay
        };

        IndicatorSnapshot {
            row,
            rsi_indicator,
            spread_between_sma,
            rsi_diff_l,
            rsi_diff_s,
            fast_below_slow,
            pivot_top,
            pivot_bottom,
            signal,
        }
    }
}

impl Strategy for SignalEvaluator {
    fn name(&self) -> &str {
        "psar-rsi-sma"
    }

    fn required_candles(&self) -> usize {
        self.cfg.required_candles()
    }

    fn evaluate(&self, candles: &[Candle]) -> Result<Signal> {
        let snap = self.snapshot(candles)?;
        debug!(
            signal = %snap.signal,
            close = snap.row.close,
            rsi = snap.row.rsi,
            psar = snap.row.psar,
            rsi_zone = snap.rsi_indicator,
            sma_spread = snap.spread_between_sma,
            rsi_diff_l = snap.rsi_diff_l,
            "Signal evaluated"
        );
        Ok(snap.signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let mut prev = closes[0];
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = prev;
                prev = close;
                let open_time = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                Candle {
                    open_time,
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume: 1.0,
                    close_time: open_time + chrono::Duration::milliseconds(59_999),
                }
            })
            .collect()
    }

    /// Zig-zag around a linear drift; the last `tail` candles drift at `tail_slope`
    /// and the final close is shifted by `jump`.
    fn zigzag(slope: f64, amp: f64, tail: usize, tail_slope: f64, jump: f64) -> Vec<Candle> {
        let n = 200;
        let mut level = 2000.0;
        let mut closes = Vec::with_capacity(n);
        for i in 0..n {
            let zig = if i % 2 == 0 { amp } else { -amp };
            closes.push(level + zig);
            level -= if i < n - tail { slope } else { tail_slope };
        }
        if let Some(last) = closes.last_mut() {
            *last += jump;
        }
        candles_from_closes(&closes)
    }

    fn row(close: f64, sma_fast: f64, sma_slow: f64, sma_trend: f64, rsi: f64, psar: f64) -> IndicatorRow {
        IndicatorRow { close, sma_fast, sma_slow, sma_trend, rsi, psar }
    }

    #[test]
    fn engineered_dip_recovery_is_a_buy() {
        // Downtrend flattening out, then a bounce above the 21 SMA.
        let candles = zigzag(1.0, 1.5, 15, 0.5, 8.0);
        let snap = SignalEvaluator::default().snapshot(&candles).unwrap();

        assert_eq!(snap.row.close, 1814.5);
        assert!((snap.row.rsi - 37.1061).abs() < 1e-3, "rsi {}", snap.row.rsi);
        assert!((snap.row.sma_slow - 1813.8095).abs() < 1e-3);
        assert_eq!(snap.row.psar, 1807.0);
        assert!(snap.rsi_indicator);
        assert!(snap.spread_between_sma);
        assert!(snap.rsi_diff_l);
        assert!(snap.fast_below_slow);
        assert_eq!(snap.signal, Signal::Buy);
    }

    #[test]
    fn pullback_in_uptrend_is_a_sell() {
        let candles = zigzag(-1.0, 1.5, 0, -1.0, -12.0);
        let evaluator = SignalEvaluator::default();
        assert_eq!(evaluator.evaluate(&candles).unwrap(), Signal::Sell);
    }

    #[test]
    fn flat_market_stays() {
        let candles = candles_from_closes(&[1850.0; 200]);
        let snap = SignalEvaluator::default().snapshot(&candles).unwrap();
        assert_eq!(snap.row.rsi, 50.0);
        assert_eq!(snap.signal, Signal::Stay);
    }

    #[test]
    fn short_window_is_insufficient_data() {
        let candles = candles_from_closes(&[1850.0; 199]);
        let err = SignalEvaluator::default().evaluate(&candles).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientData { required: 200, available: 199 }
        ));
    }

    #[test]
    fn buy_requires_close_above_psar() {
        let evaluator = SignalEvaluator::default();
        let base = row(1814.5, 1810.72, 1813.81, 1900.8, 37.1, 1807.0);
        assert_eq!(evaluator.judge(base).signal, Signal::Buy);

        let under_sar = IndicatorRow { psar: 1815.0, ..base };
        assert_eq!(evaluator.judge(under_sar).signal, Signal::Stay);
    }

    #[test]
    fn rsi_near_top_of_zone_misses_divergence() {
        // 42 is inside [35, 43] but only ~20.8% below the default top pivot of 53.
        let evaluator = SignalEvaluator::default();
        let snap = evaluator.judge(row(1814.5, 1810.72, 1813.81, 1900.8, 42.0, 1807.0));
        assert!(snap.rsi_indicator);
        assert!(!snap.rsi_diff_l);
        assert_eq!(snap.signal, Signal::Stay);
    }

    #[test]
    fn high_rsi_raises_top_pivot_and_disarms() {
        let evaluator = SignalEvaluator::default();
        let snap = evaluator.judge(row(100.0, 101.0, 100.5, 90.0, 61.0, 110.0));
        assert!(!snap.rsi_indicator);
        assert_eq!(snap.pivot_top, 61.0);
        assert_eq!(snap.pivot_bottom, 1.0);
    }

    #[test]
    fn pivots_do_not_survive_between_calls() {
        let evaluator = SignalEvaluator::default();
        evaluator.judge(row(100.0, 101.0, 100.5, 90.0, 70.0, 110.0));
        let snap = evaluator.judge(row(100.0, 101.0, 100.5, 90.0, 45.0, 110.0));
        assert_eq!(snap.pivot_top, 53.0);
    }

    #[test]
    fn spread_outside_band_blocks_buy() {
        let evaluator = SignalEvaluator::default();
        // fast 0.5% under slow: gap above the 0.2% ceiling.
        let snap = evaluator.judge(row(1814.5, 1804.74, 1813.81, 1900.8, 37.1, 1807.0));
        assert!(!snap.spread_between_sma);
        assert_eq!(snap.signal, Signal::Stay);
    }

    #[test]
    fn sell_guard_is_always_computed() {
        let evaluator = SignalEvaluator::default();
        let snap = evaluator.judge(row(99.0, 101.0, 100.0, 95.0, 48.0, 102.0));
        assert_eq!(snap.rsi_diff_s, Some(true));
        assert_eq!(snap.signal, Signal::Sell);
    }
}
