//! Windowed linear regression with mean absolute deviation.
//!
//! Closed-form least squares over a fixed window of samples at integer
//! positions 0..n-1. Data-dependent sums go through Kahan compensated
//! accumulation so long windows do not drift, and both channel code paths
//! (batch and incremental) call the one routine here.

use crate::logging::{log, obj, v_num, Domain, Level};

/// Kahan compensated accumulator: tracks the low-order bits lost by each
/// addition and folds them back into the next one.
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum
    }
}

/// Least-squares line fitted to one window, with the mean absolute
/// deviation of the samples from that line.
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub mad: f64,
}

impl LinearFit {
    const ZERO: LinearFit = LinearFit { slope: 0.0, intercept: 0.0, mad: 0.0 };

    /// Fitted value at window position `i` (0 = oldest sample).
    pub fn value_at(&self, i: usize) -> f64 {
        self.intercept + self.slope * i as f64
    }
}

// Denominator below this is treated as degenerate (window too small or
// pathological) and yields the all-zero fit.
const MIN_DENOMINATOR: f64 = 1e-10;

/// Fit a regression line to `window`, oldest sample first.
///
/// Positions are the sample indices, so `sumx` and `sumx2` collapse to
/// closed forms independent of the data:
/// `sumx = n(n-1)/2`, `sumx2 = (n-1)n(2n-1)/6`.
///
/// Pure and deterministic: the same window always produces the same fit,
/// bit for bit. The degenerate denominator case is a defined fallback, not
/// an error.
pub fn fit_window(window: &[f64]) -> LinearFit {
    if window.is_empty() {
        return LinearFit::ZERO;
    }

    let len = window.len();
    let n = len as f64;
    let sumx = (len * (len - 1)) as f64 / 2.0;
    let sumx2 = ((len - 1) * len * (2 * len - 1)) as f64 / 6.0;

    let mut sumy = KahanSum::default();
    let mut sumxy = KahanSum::default();
    for (g, &y) in window.iter().enumerate() {
        sumy.add(y);
        sumxy.add(y * g as f64);
    }

    let c = sumx2 * n - sumx * sumx;
    if c.abs() < MIN_DENOMINATOR {
        log(
            Level::Debug,
            Domain::Market,
            "degenerate_regression_window",
            obj(&[("len", v_num(n)), ("denominator", v_num(c))]),
        );
        return LinearFit::ZERO;
    }

    let slope = (sumxy.value() * n - sumx * sumy.value()) / c;
    let intercept = (sumy.value() - sumx * slope) / n;
    let fit = LinearFit { slope, intercept, mad: 0.0 };

    let mut mad = KahanSum::default();
    for (i, &y) in window.iter().enumerate() {
        mad.add((y - fit.value_at(i)).abs());
    }

    LinearFit {
        slope,
        intercept,
        mad: mad.value() / n,
    }
}
