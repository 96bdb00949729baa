//! Streaming price analytics: windowed linear-regression channels and
//! volatility-ranked instrument clustering.
//!
//! Two computations share the engine:
//!
//! - a regression channel per instrument: a least-squares line fitted over
//!   a rolling window of closes, with bands at configurable multiples of
//!   the window's mean absolute deviation. Available as a one-shot batch
//!   pass over stored history and as a per-bar incremental update; both
//!   paths drive the same estimator and agree bar for bar.
//! - volatility clustering across instruments: each instrument's rolling
//!   high/low percent move is ranked ascending at each evaluation instant
//!   and split into three percentage-weighted buckets.
//!
//! The engine consumes bars and cluster queries and emits channel values
//! and assignments. Order handling, position sizing, calendars, feeds, and
//! persistence live with the caller.

pub mod channel;
pub mod clusters;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod logging;
pub mod regression;
pub mod volatility;

pub use channel::{compute_channel, ChannelPoint, RegressionChannel};
pub use clusters::{Cluster, ClusterAssignment, ClusterSummary, VolatilityClusters};
pub use config::{ChannelConfig, ClusterConfig, EngineConfig};
pub use engine::{Bar, Engine};
pub use indicators::Sma;
pub use regression::{fit_window, KahanSum, LinearFit};
pub use volatility::VolatilityGauge;
