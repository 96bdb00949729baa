//! Per-instrument analytics state and the engine's operation surface.
//!
//! The engine owns an explicit table of indicator state keyed by
//! instrument id. Bar arrival and cluster recomputation are synchronous
//! call-and-return; the only shared mutable state is the cluster
//! assignment map, which is rebuilt and swapped, never edited in place.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::channel::{compute_channel, ChannelPoint, RegressionChannel};
use crate::clusters::{ClusterAssignment, VolatilityClusters};
use crate::config::EngineConfig;
use crate::indicators::Sma;
use crate::volatility::VolatilityGauge;

/// One OHLC bar. Timestamps come from the feed and are monotonically
/// non-decreasing per instrument; the engine never reads a clock.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bar {
    pub ts: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    // Ingestion boundary: the estimators assume finite inputs.
    fn validate(&self, id: &str) -> Result<()> {
        if !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
        {
            return Err(anyhow!("non-finite bar for {} at ts {}", id, self.ts));
        }
        if self.high < self.low {
            return Err(anyhow!(
                "bar high {} below low {} for {} at ts {}",
                self.high,
                self.low,
                id,
                self.ts
            ));
        }
        Ok(())
    }
}

/// Indicator state owned by one instrument, same lifecycle as the
/// instrument's table entry.
#[derive(Debug, Clone)]
struct InstrumentState {
    channel: RegressionChannel,
    gauge: VolatilityGauge,
    sma: Option<Sma>,
}

impl InstrumentState {
    fn new(cfg: &EngineConfig) -> Self {
        Self {
            channel: RegressionChannel::new(cfg.channel),
            gauge: VolatilityGauge::new(cfg.clusters.lookback),
            sma: cfg.sma_period.map(Sma::new),
        }
    }
}

/// Streaming analytics engine: a regression channel and volatility gauge
/// per instrument, and one cluster partition across all of them.
#[derive(Debug)]
pub struct Engine {
    cfg: EngineConfig,
    instruments: HashMap<String, InstrumentState>,
    // Registration order; the deterministic tie-break order for ranking.
    order: Vec<String>,
    clusters: VolatilityClusters,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        cfg.validate()?;
        let clusters = VolatilityClusters::new(
            cfg.clusters.one_percent,
            cfg.clusters.two_percent,
            cfg.clusters.three_percent,
        )?;
        Ok(Self {
            cfg,
            instruments: HashMap::new(),
            order: Vec::new(),
            clusters,
        })
    }

    fn state_mut(&mut self, id: &str) -> &mut InstrumentState {
        if !self.instruments.contains_key(id) {
            self.order.push(id.to_string());
        }
        let cfg = self.cfg;
        self.instruments
            .entry(id.to_string())
            .or_insert_with(|| InstrumentState::new(&cfg))
    }

    /// Feed one bar's close into the instrument's regression window (and
    /// SMA, when configured). Returns the channel point for this bar - the
    /// NaN sentinel until the window has a full period of closes.
    ///
    /// Instruments register on first bar; registration order is stable.
    pub fn on_bar(&mut self, id: &str, bar: &Bar) -> Result<ChannelPoint> {
        bar.validate(id)?;
        let state = self.state_mut(id);
        if let Some(sma) = state.sma.as_mut() {
            sma.update(bar.close);
        }
        Ok(state.channel.update(bar.close))
    }

    /// Feed one bar's high/low into the instrument's volatility gauge and
    /// return the current percent move.
    pub fn on_bar_volatility(&mut self, id: &str, bar: &Bar) -> Result<f64> {
        bar.validate(id)?;
        Ok(self.state_mut(id).gauge.update(bar.high, bar.low))
    }

    /// One-shot batch pass over a full close history. The output has the
    /// same length as the input, sentinel-padded at the front, and agrees
    /// bar for bar with what sequential `on_bar` calls would produce. The
    /// instrument's incremental window is left primed with the history
    /// tail so later `on_bar` calls continue the series.
    pub fn batch_compute(&mut self, id: &str, closes: &[f64]) -> Result<Vec<ChannelPoint>> {
        if let Some(bad) = closes.iter().find(|c| !c.is_finite()) {
            return Err(anyhow!("non-finite close {} in history for {}", bad, id));
        }
        let out = compute_channel(closes, &self.cfg.channel);
        let last = out.last().copied().unwrap_or_else(ChannelPoint::not_ready);
        self.state_mut(id).channel.reseed(closes, last);
        Ok(out)
    }

    /// Rank every instrument whose gauge has a full lookback of
    /// observations and rebuild the cluster assignment. Instruments still
    /// warming up are excluded from ranking entirely. Idempotent per
    /// evaluation instant; callers supply the instant.
    pub fn recompute_clusters(&mut self, instant: u64) -> &HashMap<String, ClusterAssignment> {
        let readings: Vec<(String, f64)> = self
            .order
            .iter()
            .filter_map(|id| {
                let state = self.instruments.get(id)?;
                if state.gauge.is_ready() {
                    Some((id.clone(), state.gauge.percent_move()))
                } else {
                    None
                }
            })
            .collect();
        self.clusters.recompute(instant, &readings)
    }

    /// Membership query against the most recent assignment.
    pub fn is_in_cluster(&self, id: &str, cluster_number: u8) -> bool {
        self.clusters.is_in_cluster(id, cluster_number)
    }

    pub fn clusters(&self) -> &VolatilityClusters {
        &self.clusters
    }

    /// Last channel point for an instrument that has received bars.
    pub fn channel_point(&self, id: &str) -> Option<ChannelPoint> {
        self.instruments.get(id).map(|s| s.channel.last())
    }

    /// Current volatility percent move (0 while the gauge is empty).
    pub fn volatility(&self, id: &str) -> Option<f64> {
        self.instruments.get(id).map(|s| s.gauge.percent_move())
    }

    /// Current SMA value, when the trend filter is configured.
    pub fn sma(&self, id: &str) -> Option<f64> {
        self.instruments
            .get(id)
            .and_then(|s| s.sma.as_ref())
            .map(|s| s.get())
    }

    pub fn instrument_count(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, ClusterConfig};

    fn engine(period: usize, lookback: usize) -> Engine {
        let cfg = EngineConfig::new(
            ChannelConfig::new(period, 2.0, 2.0).unwrap(),
            ClusterConfig::new(lookback, 33.0, 33.0, 34.0).unwrap(),
        );
        Engine::new(cfg).unwrap()
    }

    fn bar(ts: u64, high: f64, low: f64, close: f64) -> Bar {
        Bar { ts, open: close, high, low, close }
    }

    #[test]
    fn test_rejects_invalid_config_literal() {
        // Public fields allow skipping the checked constructors; the
        // engine re-validates.
        let cfg = EngineConfig {
            channel: ChannelConfig { period: 1, up_deviation: 2.0, down_deviation: 2.0 },
            clusters: ClusterConfig::new(3, 33.0, 33.0, 34.0).unwrap(),
            sma_period: None,
        };
        assert!(Engine::new(cfg).is_err());
    }

    #[test]
    fn test_rejects_non_finite_bar() {
        let mut engine = engine(5, 3);
        let result = engine.on_bar("btc", &bar(1, f64::NAN, 90.0, 95.0));
        assert!(result.is_err());
        // Rejected at the boundary: no state was created or touched.
        assert!(engine.channel_point("btc").is_none());
    }

    #[test]
    fn test_rejects_inverted_high_low() {
        let mut engine = engine(5, 3);
        assert!(engine.on_bar_volatility("btc", &bar(1, 90.0, 100.0, 95.0)).is_err());
    }

    #[test]
    fn test_sentinel_until_period_filled() {
        let mut engine = engine(3, 3);
        for ts in 0..2 {
            let point = engine.on_bar("eth", &bar(ts, 101.0, 99.0, 100.0)).unwrap();
            assert!(!point.is_ready());
        }
        let point = engine.on_bar("eth", &bar(2, 101.0, 99.0, 100.0)).unwrap();
        assert!(point.is_ready());
        assert!((point.regression - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_rejects_non_finite_history() {
        let mut engine = engine(3, 3);
        assert!(engine.batch_compute("eth", &[1.0, f64::INFINITY, 3.0]).is_err());
    }

    #[test]
    fn test_batch_then_incremental_continues() {
        let mut engine = engine(4, 3);
        let history: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64 * 0.3).cos()).collect();
        let batch = engine.batch_compute("eth", &history).unwrap();
        assert_eq!(batch.len(), 20);
        assert!(batch[19].is_ready());

        // The primed window makes the next bar agree with a full batch
        // over the extended history.
        let mut extended = history.clone();
        extended.push(103.5);
        let full = compute_channel(&extended, &ChannelConfig::new(4, 2.0, 2.0).unwrap());
        let inc = engine.on_bar("eth", &bar(20, 104.0, 103.0, 103.5)).unwrap();
        assert_eq!(inc.regression.to_bits(), full[20].regression.to_bits());
        assert_eq!(inc.upper.to_bits(), full[20].upper.to_bits());
    }

    #[test]
    fn test_warming_instruments_excluded_from_ranking() {
        let mut engine = engine(5, 2);
        for ts in 0..2 {
            engine.on_bar_volatility("ready_a", &bar(ts, 110.0, 100.0, 105.0)).unwrap();
            engine.on_bar_volatility("ready_b", &bar(ts, 120.0, 100.0, 110.0)).unwrap();
        }
        engine.on_bar_volatility("warming", &bar(1, 200.0, 100.0, 150.0)).unwrap();

        let assignments = engine.recompute_clusters(100);
        assert_eq!(assignments.len(), 2);
        assert!(engine.clusters().assignment("warming").is_none());
    }

    #[test]
    fn test_sma_tracks_closes() {
        let cfg = EngineConfig::new(
            ChannelConfig::new(5, 2.0, 2.0).unwrap(),
            ClusterConfig::new(3, 33.0, 33.0, 34.0).unwrap(),
        )
        .with_sma(2)
        .unwrap();
        let mut engine = Engine::new(cfg).unwrap();
        engine.on_bar("eth", &bar(0, 11.0, 9.0, 10.0)).unwrap();
        engine.on_bar("eth", &bar(1, 21.0, 19.0, 20.0)).unwrap();
        assert_eq!(engine.sma("eth"), Some(15.0));
    }

    #[test]
    fn test_sma_absent_when_not_configured() {
        let mut engine = engine(5, 3);
        engine.on_bar("eth", &bar(0, 11.0, 9.0, 10.0)).unwrap();
        assert_eq!(engine.sma("eth"), None);
    }
}
