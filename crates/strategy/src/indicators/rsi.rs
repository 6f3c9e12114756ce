/// RSI (Relative Strength Index) indicator.
///
/// Gains and losses are averaged with an adjusted exponential weighting,
/// `alpha = 1 / period` (centre of mass `period - 1`). A value is produced
/// only once `period` price changes have been observed.
///
/// A perfectly flat window (no gains and no losses) reads as 50.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

/// RSI reported when the window has neither gains nor losses.
pub const FLAT_RSI: f64 = 50.0;

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period }
    }

    /// RSI for every close (oldest first), aligned by index.
    /// Entries stay `None` until `period` deltas are available, i.e. indices `0..period`.
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let decay = 1.0 - 1.0 / self.period as f64;

        let mut out = Vec::with_capacity(closes.len());
        if closes.is_empty() {
            return out;
        }
        out.push(None);

        let mut gain_acc = 0.0;
        let mut loss_acc = 0.0;
        let mut weight = 0.0;
        for (n, w) in closes.windows(2).enumerate() {
            let change = w[1] - w[0];
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { -change } else { 0.0 };

            gain_acc = gain + decay * gain_acc;
            loss_acc = loss + decay * loss_acc;
            weight = 1.0 + decay * weight;

            if n + 1 < self.period {
                out.push(None);
            } else {
                out.push(Some(rsi_from(gain_acc / weight, loss_acc / weight)));
            }
        }
        out
    }

    /// RSI of the latest close, or `None` with fewer than `period + 1` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied().flatten()
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { FLAT_RSI } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
