//! Engine configuration. Everything is validated when constructed and
//! immutable afterwards; `from_env` mirrors the usual deployment knobs.

use anyhow::{anyhow, Result};

/// Regression channel parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChannelConfig {
    pub period: usize,
    pub up_deviation: f64,
    pub down_deviation: f64,
}

impl ChannelConfig {
    pub fn new(period: usize, up_deviation: f64, down_deviation: f64) -> Result<Self> {
        if period < 2 {
            return Err(anyhow!("channel period must be >= 2, got {}", period));
        }
        if !up_deviation.is_finite() || up_deviation < 0.0 {
            return Err(anyhow!("up_deviation must be finite and >= 0, got {}", up_deviation));
        }
        if !down_deviation.is_finite() || down_deviation < 0.0 {
            return Err(anyhow!("down_deviation must be finite and >= 0, got {}", down_deviation));
        }
        Ok(Self { period, up_deviation, down_deviation })
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { period: 100, up_deviation: 2.0, down_deviation: 2.0 }
    }
}

/// Volatility clustering parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterConfig {
    /// Candles of high/low history per instrument used for ranking.
    pub lookback: usize,
    pub one_percent: f64,
    pub two_percent: f64,
    pub three_percent: f64,
}

impl ClusterConfig {
    pub fn new(lookback: usize, one_percent: f64, two_percent: f64, three_percent: f64) -> Result<Self> {
        if lookback < 1 {
            return Err(anyhow!("cluster lookback must be >= 1, got {}", lookback));
        }
        for (name, pct) in [
            ("one_percent", one_percent),
            ("two_percent", two_percent),
            ("three_percent", three_percent),
        ] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(anyhow!("cluster {} must be finite and >= 0, got {}", name, pct));
            }
        }
        let total = one_percent + two_percent + three_percent;
        if (total - 100.0).abs() > 0.01 {
            return Err(anyhow!("cluster percentages must sum to 100, got {}", total));
        }
        Ok(Self { lookback, one_percent, two_percent, three_percent })
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { lookback: 100, one_percent: 33.0, two_percent: 33.0, three_percent: 34.0 }
    }
}

/// Whole-engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub channel: ChannelConfig,
    pub clusters: ClusterConfig,
    /// Trend-filter SMA period; `None` disables the per-instrument SMA.
    pub sma_period: Option<usize>,
}

impl EngineConfig {
    pub fn new(channel: ChannelConfig, clusters: ClusterConfig) -> Self {
        Self { channel, clusters, sma_period: None }
    }

    pub fn with_sma(mut self, period: usize) -> Result<Self> {
        if period < 1 {
            return Err(anyhow!("sma period must be >= 1, got {}", period));
        }
        self.sma_period = Some(period);
        Ok(self)
    }

    /// Re-run every constructor check. Fields are public, so the engine
    /// revalidates at construction rather than trusting the literal.
    pub fn validate(&self) -> Result<()> {
        ChannelConfig::new(self.channel.period, self.channel.up_deviation, self.channel.down_deviation)?;
        ClusterConfig::new(
            self.clusters.lookback,
            self.clusters.one_percent,
            self.clusters.two_percent,
            self.clusters.three_percent,
        )?;
        if let Some(period) = self.sma_period {
            if period < 1 {
                return Err(anyhow!("sma period must be >= 1, got {}", period));
            }
        }
        Ok(())
    }

    pub fn from_env() -> Result<Self> {
        let period = std::env::var("LR_PERIOD").ok().and_then(|v| v.parse().ok()).unwrap_or(180);
        let deviation = std::env::var("LR_DEVIATION").ok().and_then(|v| v.parse().ok()).unwrap_or(2.4);
        let channel = ChannelConfig::new(period, deviation, deviation)?;

        let lookback = std::env::var("CLUSTER_LOOKBACK").ok().and_then(|v| v.parse().ok()).unwrap_or(30);
        let one = std::env::var("CLUSTER_ONE_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(33.0);
        let two = std::env::var("CLUSTER_TWO_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(33.0);
        let three = std::env::var("CLUSTER_THREE_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(34.0);
        let clusters = ClusterConfig::new(lookback, one, two, three)?;

        let sma_filter = std::env::var("SMA_FILTER")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        let mut cfg = Self::new(channel, clusters);
        if sma_filter {
            let sma_period = std::env::var("SMA_PERIOD").ok().and_then(|v| v.parse().ok()).unwrap_or(170);
            cfg = cfg.with_sma(sma_period)?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_config_rejects_short_period() {
        assert!(ChannelConfig::new(1, 2.0, 2.0).is_err());
        assert!(ChannelConfig::new(2, 2.0, 2.0).is_ok());
    }

    #[test]
    fn test_channel_config_rejects_bad_deviation() {
        assert!(ChannelConfig::new(10, -0.1, 2.0).is_err());
        assert!(ChannelConfig::new(10, 2.0, f64::NAN).is_err());
        assert!(ChannelConfig::new(10, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_cluster_config_percent_sum() {
        assert!(ClusterConfig::new(30, 33.0, 33.0, 34.0).is_ok());
        // Inside the 0.01 tolerance
        assert!(ClusterConfig::new(30, 33.335, 33.335, 33.335).is_ok());
        assert!(ClusterConfig::new(30, 33.0, 33.0, 35.0).is_err());
        assert!(ClusterConfig::new(30, 50.0, 50.0, 50.0).is_err());
    }

    #[test]
    fn test_cluster_config_rejects_zero_lookback() {
        assert!(ClusterConfig::new(0, 33.0, 33.0, 34.0).is_err());
    }

    #[test]
    fn test_cluster_config_rejects_negative_percent() {
        assert!(ClusterConfig::new(30, -10.0, 55.0, 55.0).is_err());
    }

    #[test]
    fn test_from_env_defaults() {
        // None of these vars are set in the test environment.
        let cfg = EngineConfig::from_env().unwrap();
        assert_eq!(cfg.channel.period, 180);
        assert!((cfg.channel.up_deviation - 2.4).abs() < 1e-12);
        assert!((cfg.channel.down_deviation - 2.4).abs() < 1e-12);
        assert_eq!(cfg.clusters.lookback, 30);
        assert!((cfg.clusters.three_percent - 34.0).abs() < 1e-12);
        assert_eq!(cfg.sma_period, Some(170));
    }

    #[test]
    fn test_with_sma() {
        let cfg = EngineConfig::new(ChannelConfig::default(), ClusterConfig::default());
        assert!(cfg.sma_period.is_none());
        let cfg = cfg.with_sma(170).unwrap();
        assert_eq!(cfg.sma_period, Some(170));
        assert!(EngineConfig::new(ChannelConfig::default(), ClusterConfig::default())
            .with_sma(0)
            .is_err());
    }
}
