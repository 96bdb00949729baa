//! Regression channel - a fitted trend line with deviation bands, produced
//! both as a one-shot batch pass over stored history and as a per-bar
//! incremental update. Both paths slice windows into the same estimator,
//! so they agree bar for bar.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::ChannelConfig;
use crate::regression::{fit_window, LinearFit};

/// Per-bar channel output. Every field is NaN until the backing window has
/// `period` observations; callers must treat that as "channel not ready".
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChannelPoint {
    pub regression: f64,
    pub upper: f64,
    pub lower: f64,
}

impl ChannelPoint {
    pub fn not_ready() -> Self {
        Self { regression: f64::NAN, upper: f64::NAN, lower: f64::NAN }
    }

    pub fn is_ready(&self) -> bool {
        !self.regression.is_nan()
    }
}

fn point_from_fit(fit: LinearFit, cfg: &ChannelConfig) -> ChannelPoint {
    let regression = fit.value_at(cfg.period - 1);
    ChannelPoint {
        regression,
        upper: regression + fit.mad * cfg.up_deviation,
        lower: regression - fit.mad * cfg.down_deviation,
    }
}

/// Batch pass over a full close history. The output has the same length as
/// the input, sentinel-padded for the first `period - 1` indices; index
/// `i >= period - 1` fits the trailing `period` closes ending at `i`.
pub fn compute_channel(closes: &[f64], cfg: &ChannelConfig) -> Vec<ChannelPoint> {
    let period = cfg.period;
    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i + 1 < period {
            out.push(ChannelPoint::not_ready());
        } else {
            out.push(point_from_fit(fit_window(&closes[i + 1 - period..=i]), cfg));
        }
    }
    out
}

/// Incremental regression channel for one instrument. Owns the rolling
/// window of the last `period` closes.
#[derive(Debug, Clone)]
pub struct RegressionChannel {
    cfg: ChannelConfig,
    window: VecDeque<f64>,
    last: ChannelPoint,
}

impl RegressionChannel {
    pub fn new(cfg: ChannelConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(cfg.period),
            cfg,
            last: ChannelPoint::not_ready(),
        }
    }

    /// Push a close, evicting the oldest once at capacity, and produce the
    /// channel point for this bar.
    pub fn update(&mut self, close: f64) -> ChannelPoint {
        self.window.push_back(close);
        if self.window.len() > self.cfg.period {
            self.window.pop_front();
        }
        self.last = if self.window.len() < self.cfg.period {
            ChannelPoint::not_ready()
        } else {
            point_from_fit(fit_window(self.window.make_contiguous()), &self.cfg)
        };
        self.last
    }

    /// Last produced point (sentinel before any full window).
    pub fn last(&self) -> ChannelPoint {
        self.last
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() >= self.cfg.period
    }

    /// Replace the window with the tail of a replayed history. `last` comes
    /// from the batch output for the same history, so a following `update`
    /// continues the series without recomputing anything here.
    pub(crate) fn reseed(&mut self, closes: &[f64], last: ChannelPoint) {
        self.window.clear();
        let skip = closes.len().saturating_sub(self.cfg.period);
        self.window.extend(closes[skip..].iter().copied());
        self.last = last;
    }
}
