use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Acceleration settings for the parabolic stop-and-reverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsarParams {
    pub init_af: f64,
    pub max_af: f64,
    pub af_step: f64,
}

impl Default for PsarParams {
    fn default() -> Self {
        Self {
            init_af: 0.03,
            max_af: 0.1,
            af_step: 0.00265,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

/// Incremental PSAR state. Advanced exactly once per candle, oldest first.
///
/// The first two candles only seed the trailing windows and yield `None`.
/// The third establishes the trend from the direction of the two stored highs.
/// From then on the SAR trails price and flips side on a reversal, at which
/// point the acceleration factor drops back to `init_af`.
#[derive(Debug, Clone)]
pub struct PsarState {
    params: PsarParams,
    af: f64,
    extreme_point: f64,
    trend: Option<Trend>,
    high_window: VecDeque<f64>,
    low_window: VecDeque<f64>,
    /// Highs seen since the last reversal while trending up.
    high_trend: Vec<f64>,
    /// Lows seen since the last reversal while trending down.
    low_trend: Vec<f64>,
    days: usize,
    prev_psar: Option<f64>,
}

const WINDOW: usize = 2;

impl PsarState {
    pub fn new(params: PsarParams) -> Self {
        Self {
            af: params.init_af,
            params,
            extreme_point: 0.0,
            trend: None,
            high_window: VecDeque::with_capacity(WINDOW + 1),
            low_window: VecDeque::with_capacity(WINDOW + 1),
            high_trend: Vec::new(),
            low_trend: Vec::new(),
            days: 0,
            prev_psar: None,
        }
    }

    pub fn trend(&self) -> Option<Trend> {
        self.trend
    }

    pub fn acceleration_factor(&self) -> f64 {
        self.af
    }

    pub fn extreme_point(&self) -> f64 {
        self.extreme_point
    }

    /// Feed one candle's high/low and return the SAR for it.
    pub fn next(&mut self, high: f64, low: f64) -> Option<f64> {
        let psar = if self.days >= 3 {
            self.project()
        } else {
            self.seed(high)
        };

        match self.trend {
            Some(Trend::Up) => self.high_trend.push(high),
            Some(Trend::Down) => self.low_trend.push(low),
            None => {}
        }

        let psar = psar.map(|p| self.reverse_or_accelerate(p, high, low));

        push_window(&mut self.high_window, high);
        push_window(&mut self.low_window, low);
        self.days += 1;
        self.prev_psar = psar;
        psar
    }

    fn seed(&mut self, high: f64) -> Option<f64> {
        if self.low_window.len() < WINDOW {
            self.trend = None;
            self.extreme_point = high;
            return None;
        }

        if self.high_window[0] < self.high_window[1] {
            self.trend = Some(Trend::Up);
            self.extreme_point = max_of(&self.high_window);
            Some(min_of(&self.low_window))
        } else {
            self.trend = Some(Trend::Down);
            self.extreme_point = min_of(&self.low_window);
            Some(max_of(&self.high_window))
        }
    }

    fn project(&self) -> Option<f64> {
        let prev = self.prev_psar?;
        match self.trend? {
            Trend::Up => {
                let psar = prev + self.af * (self.extreme_point - prev);
                Some(psar.min(min_of(&self.low_window)))
            }
            Trend::Down => {
                let psar = prev - self.af * (prev - self.extreme_point);
                Some(psar.max(max_of(&self.high_window)))
            }
        }
    }

    fn reverse_or_accelerate(&mut self, psar: f64, high: f64, low: f64) -> f64 {
        let reversed = match self.trend {
            Some(Trend::Up) if psar > low => {
                self.trend = Some(Trend::Down);
                self.extreme_point = low;
                Some(max_of(&self.high_trend))
            }
            Some(Trend::Down) if psar < high => {
                self.trend = Some(Trend::Up);
                self.extreme_point = high;
                Some(min_of(&self.low_trend))
            }
            _ => None,
        };

        if let Some(flipped) = reversed {
            self.af = self.params.init_af;
            self.high_trend.clear();
            self.low_trend.clear();
            return flipped;
        }

        let new_extreme = match self.trend {
            Some(Trend::Up) if high > self.extreme_point => Some(high),
            Some(Trend::Down) if low < self.extreme_point => Some(low),
            _ => None,
        };
        if let Some(ep) = new_extreme {
            self.af = (self.af + self.params.af_step).min(self.params.max_af);
            self.extreme_point = ep;
        }
        psar
    }
}

fn push_window(window: &mut VecDeque<f64>, value: f64) {
    window.push_back(value);
    if window.len() > WINDOW {
        window.pop_front();
    }
}

fn max_of<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn min_of<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().copied().fold(f64::INFINITY, f64::min)
}

/// Run a fresh `PsarState` over `(high, low)` bars and collect one SAR per bar.
pub fn psar_series<I>(params: PsarParams, bars: I) -> Vec<Option<f64>>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    bars.into_iter()
        .scan(PsarState::new(params), |state, (high, low)| {
            Some(state.next(high, low))
        })
        .collect()
}
