//! Volatility clustering - rank instruments by rolling percent move and
//! split them into three percentage-weighted buckets.
//!
//! The assignment is rebuilt wholesale and swapped in at each new
//! evaluation instant; readers never observe a partial mapping.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::logging::{log, obj, v_num, Domain, Level};

/// One of the three ranked buckets, lowest volatility first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cluster {
    One,
    Two,
    Three,
}

impl Cluster {
    pub fn number(&self) -> u8 {
        match self {
            Cluster::One => 1,
            Cluster::Two => 2,
            Cluster::Three => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Cluster::One),
            2 => Some(Cluster::Two),
            3 => Some(Cluster::Three),
            _ => None,
        }
    }
}

/// Where one instrument landed at the last recompute, with the reading
/// that put it there.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterAssignment {
    pub cluster: Cluster,
    pub volatility: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterMember {
    pub id: String,
    pub volatility: f64,
}

/// Diagnostics snapshot of the current assignment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterSummary {
    pub cluster_one: Vec<ClusterMember>,
    pub cluster_two: Vec<ClusterMember>,
    pub cluster_three: Vec<ClusterMember>,
    pub one_lot: f64,
}

/// Partitions the instrument universe into three volatility buckets sized
/// by configured percentages.
#[derive(Debug, Clone)]
pub struct VolatilityClusters {
    one_percent: f64,
    two_percent: f64,
    three_percent: f64,
    assignments: HashMap<String, ClusterAssignment>,
    one_lot: f64,
    last_instant: Option<u64>,
}

impl VolatilityClusters {
    /// Percentages must sum to 100 within 0.01; anything else refuses to
    /// build the partitioner.
    pub fn new(one_percent: f64, two_percent: f64, three_percent: f64) -> Result<Self> {
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
        Ok(Self {
            one_percent,
            two_percent,
            three_percent,
            assignments: HashMap::new(),
            one_lot: 0.0,
            last_instant: None,
        })
    }

    /// Rank `readings` ascending by volatility and rebuild the assignment.
    ///
    /// Idempotent per evaluation instant: a repeated call for an instant
    /// already processed returns the existing mapping untouched. An empty
    /// reading set marks the instant processed but leaves the previous
    /// assignment in place. With exactly one reading the percentage split
    /// is meaningless and the instrument goes to cluster one.
    ///
    /// Ties rank in input order (stable sort), so callers supplying
    /// readings in a fixed order get a deterministic partition.
    pub fn recompute(
        &mut self,
        instant: u64,
        readings: &[(String, f64)],
    ) -> &HashMap<String, ClusterAssignment> {
        if self.last_instant == Some(instant) {
            return &self.assignments;
        }
        self.last_instant = Some(instant);
        if readings.is_empty() {
            return &self.assignments;
        }

        let mut next = HashMap::with_capacity(readings.len());
        if readings.len() == 1 {
            let (id, volatility) = &readings[0];
            next.insert(
                id.clone(),
                ClusterAssignment { cluster: Cluster::One, volatility: *volatility },
            );
            self.one_lot = 1.0 / 100.0;
        } else {
            let mut ranked: Vec<&(String, f64)> = readings.iter().collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

            let total = ranked.len();
            self.one_lot = total as f64 / 100.0;
            let limit_one = self.one_percent * self.one_lot;
            let limit_two = (self.one_percent + self.two_percent) * self.one_lot;

            for (i, (id, volatility)) in ranked.into_iter().enumerate() {
                let rank = (i + 1) as f64;
                let cluster = if rank <= limit_one {
                    Cluster::One
                } else if rank <= limit_two {
                    Cluster::Two
                } else {
                    Cluster::Three
                };
                next.insert(id.clone(), ClusterAssignment { cluster, volatility: *volatility });
            }
        }

        self.assignments = next;
        log(
            Level::Debug,
            Domain::Cluster,
            "clusters_recomputed",
            obj(&[
                ("instant", v_num(instant as f64)),
                ("instruments", v_num(self.assignments.len() as f64)),
                ("one_lot", v_num(self.one_lot)),
            ]),
        );
        &self.assignments
    }

    /// O(1) membership query against the last computed assignment. An
    /// unknown instrument or out-of-range cluster number is simply false.
    pub fn is_in_cluster(&self, id: &str, cluster_number: u8) -> bool {
        match (self.assignments.get(id), Cluster::from_number(cluster_number)) {
            (Some(assignment), Some(cluster)) => assignment.cluster == cluster,
            _ => false,
        }
    }

    pub fn cluster_of(&self, id: &str) -> Option<Cluster> {
        self.assignments.get(id).map(|a| a.cluster)
    }

    pub fn assignment(&self, id: &str) -> Option<&ClusterAssignment> {
        self.assignments.get(id)
    }

    pub fn assignments(&self) -> &HashMap<String, ClusterAssignment> {
        &self.assignments
    }

    /// Instrument count / 100 from the last non-empty recompute.
    pub fn one_lot(&self) -> f64 {
        self.one_lot
    }

    pub fn last_instant(&self) -> Option<u64> {
        self.last_instant
    }

    pub fn summary(&self) -> ClusterSummary {
        let mut summary = ClusterSummary { one_lot: self.one_lot, ..Default::default() };
        for (id, assignment) in &self.assignments {
            let member = ClusterMember { id: id.clone(), volatility: assignment.volatility };
            match assignment.cluster {
                Cluster::One => summary.cluster_one.push(member),
                Cluster::Two => summary.cluster_two.push(member),
                Cluster::Three => summary.cluster_three.push(member),
            }
        }
        for bucket in [
            &mut summary.cluster_one,
            &mut summary.cluster_two,
            &mut summary.cluster_three,
        ] {
            bucket.sort_by(|a, b| {
                a.volatility
                    .partial_cmp(&b.volatility)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        summary
    }
}
