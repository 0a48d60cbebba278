//! Urban-form metrics for a single street graph
//!
//! A [`MetricsRecord`] is a fixed set of scalar statistics ([`BasicStats`])
//! plus a histogram of streets per node. The histogram stays a typed map
//! here; it is only flattened into `{k}_way_int_*` columns by the dataset
//! layer.

pub mod compute;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::identity::IdentityKey;

pub use compute::MetricsCalculator;

/// Square metres per square kilometre
pub const M2_PER_KM2: f64 = 1_000_000.0;

/// Nodes with exactly k incident streets
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IntersectionShare {
    pub count: u64,
    /// Share of street-bearing nodes, in [0, 1]
    pub proportion: f64,
}

/// Scalar statistics of a projected street graph
///
/// Lengths are in projected units (metres for UTM). Values that have no
/// meaning for the graph at hand are `None` rather than NaN.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BasicStats {
    /// Node count
    pub n: u64,
    /// Directed edge count
    pub m: u64,
    /// Average node degree, 2m/n
    pub k_avg: f64,
    pub edge_length_total: f64,
    pub edge_length_avg: f64,
    pub streets_per_node_avg: f64,
    /// Nodes with at least two incident streets
    pub intersection_count: u64,
    pub street_length_total: f64,
    pub street_segment_count: u64,
    pub street_length_avg: f64,
    /// Street length over straight-line distance between street endpoints
    pub circuity_avg: Option<f64>,
    pub self_loop_proportion: f64,
    pub node_density_km: Option<f64>,
    pub intersection_density_km: Option<f64>,
    pub edge_density_km: Option<f64>,
    pub street_density_km: Option<f64>,
}

/// Metrics of one city
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub identity: IdentityKey,
    pub stats: BasicStats,
    /// Streets-per-node histogram keyed by k
    pub intersections: BTreeMap<u32, IntersectionShare>,
    /// Convex hull area of the projected nodes
    pub area: f64,
}

impl MetricsRecord {
    pub fn geoname_id(&self) -> u64 {
        self.identity.geoname_id
    }

    /// Count of nodes with exactly `k` streets (0 when unobserved)
    pub fn way_int_count(&self, k: u32) -> u64 {
        self.intersections.get(&k).map_or(0, |s| s.count)
    }
}
