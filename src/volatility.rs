//! Rolling high/low range volatility, expressed as a percentage move.

use std::collections::VecDeque;

use crate::logging::{log, obj, v_num, Domain, Level};

/// Per-instrument gauge over the last `lookback` (high, low) pairs.
///
/// Computes with whatever history it has (fewer pairs while warming up);
/// whether a partial reading may enter cluster ranking is the caller's
/// decision via `is_ready`.
#[derive(Debug, Clone)]
pub struct VolatilityGauge {
    lookback: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
}

impl VolatilityGauge {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            highs: VecDeque::with_capacity(lookback),
            lows: VecDeque::with_capacity(lookback),
        }
    }

    /// Push one bar's extremes and return the current percent move.
    pub fn update(&mut self, high: f64, low: f64) -> f64 {
        self.highs.push_back(high);
        self.lows.push_back(low);
        if self.highs.len() > self.lookback {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        self.percent_move()
    }

    /// `(max(high) - min(low)) / (min(low) / 100)` over the window.
    ///
    /// 0 with no observations, and 0 when the minimum low is zero - a
    /// defined fallback, not an error.
    pub fn percent_move(&self) -> f64 {
        if self.highs.is_empty() {
            return 0.0;
        }
        let max_high = self.highs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_low = self.lows.iter().cloned().fold(f64::INFINITY, f64::min);
        if min_low == 0.0 {
            log(
                Level::Debug,
                Domain::Market,
                "volatility_zero_low",
                obj(&[("observations", v_num(self.lows.len() as f64))]),
            );
            return 0.0;
        }
        (max_high - min_low) / (min_low / 100.0)
    }

    /// True once the gauge has a full lookback of observations.
    pub fn is_ready(&self) -> bool {
        self.highs.len() >= self.lookback
    }

    pub fn len(&self) -> usize {
        self.highs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.highs.is_empty()
    }
}
