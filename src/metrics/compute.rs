//! Metric computation
//!
//! Everything is measured on the projected graph. Stored edge lengths win
//! over geometry; an edge without one is measured as the straight line
//! between its projected endpoints.

use std::collections::BTreeMap;

use super::{BasicStats, IntersectionShare, MetricsRecord, M2_PER_KM2};
use crate::geometry::{GeometryOps, UtmGeometry};
use crate::graph::{street_segments, streets_per_node, StreetEdge, StreetGraph, StreetNode};
use crate::identity::IdentityKey;

/// Computes a [`MetricsRecord`] from a street graph
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator<G = UtmGeometry> {
    geometry: G,
}

impl<G: GeometryOps> MetricsCalculator<G> {
    pub fn new(geometry: G) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// Compute all metrics for one city
    ///
    /// Never fails: empty and single-node graphs give zero counts, an empty
    /// histogram and `None` for ratios without a denominator.
    pub fn compute(&self, graph: &StreetGraph, identity: &IdentityKey) -> MetricsRecord {
        let projected = self.geometry.project(graph);
        let area = self.geometry.hull_area(&projected.positions());
        let area = if area.is_finite() && area > 0.0 { area } else { 0.0 };

        let spn = streets_per_node(&projected);
        let stats = basic_stats(&projected, spn.values().copied(), area);
        let intersections = intersection_shares(spn.values().copied(), projected.node_count());

        tracing::debug!(
            city = %identity,
            n = stats.n,
            m = stats.m,
            area,
            "computed metrics"
        );

        MetricsRecord {
            identity: identity.clone(),
            stats,
            intersections,
            area,
        }
    }
}

/// Straight-line distance; 0 when either endpoint did not project to a finite point
fn planar_distance(u: &StreetNode, v: &StreetNode) -> f64 {
    let d = (v.x - u.x).hypot(v.y - u.y);
    if d.is_finite() {
        d
    } else {
        0.0
    }
}

fn edge_length(u: &StreetNode, v: &StreetNode, edge: &StreetEdge) -> f64 {
    match edge.length {
        Some(length) if length.is_finite() => length,
        _ => planar_distance(u, v),
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn density(quantity: f64, area_km2: f64) -> Option<f64> {
    (area_km2 > 0.0).then(|| quantity / area_km2)
}

fn basic_stats(graph: &StreetGraph, spn: impl Iterator<Item = u32>, area: f64) -> BasicStats {
    let n = graph.node_count() as u64;
    let m = graph.edge_count() as u64;

    let edge_length_total: f64 = graph.edges().map(|(u, v, e)| edge_length(u, v, e)).sum();

    let (spn_total, intersection_count) = spn.fold((0u64, 0u64), |(total, ints), k| {
        (total + u64::from(k), ints + u64::from(k >= 2))
    });

    let mut street_length_total = 0.0;
    let mut straight_total = 0.0;
    let mut self_loops = 0u64;
    let segments = street_segments(graph);
    for segment in &segments {
        let (Some(u), Some(v)) = (graph.node(segment.from), graph.node(segment.to)) else {
            continue;
        };
        street_length_total += edge_length(u, v, &segment.edge);
        straight_total += planar_distance(u, v);
        self_loops += u64::from(segment.is_self_loop());
    }
    let street_segment_count = segments.len() as u64;

    let area_km2 = area / M2_PER_KM2;

    BasicStats {
        n,
        m,
        k_avg: ratio(2.0 * m as f64, n as f64),
        edge_length_total,
        edge_length_avg: ratio(edge_length_total, m as f64),
        streets_per_node_avg: ratio(spn_total as f64, n as f64),
        intersection_count,
        street_length_total,
        street_segment_count,
        street_length_avg: ratio(street_length_total, street_segment_count as f64),
        circuity_avg: (straight_total > 0.0).then(|| street_length_total / straight_total),
        self_loop_proportion: ratio(self_loops as f64, street_segment_count as f64),
        node_density_km: density(n as f64, area_km2),
        intersection_density_km: density(intersection_count as f64, area_km2),
        edge_density_km: density(edge_length_total, area_km2),
        street_density_km: density(street_length_total, area_km2),
    }
}

/// Histogram of streets per node
///
/// Isolated nodes count as k = 0. Graphs with fewer than two nodes have no
/// histogram at all.
fn intersection_shares(spn: impl Iterator<Item = u32>, node_count: usize) -> BTreeMap<u32, IntersectionShare> {
    if node_count < 2 {
        return BTreeMap::new();
    }
    let mut counts: BTreeMap<u32, u64> = BTreeMap::new();
    for k in spn {
        *counts.entry(k).or_insert(0) += 1;
    }
    let total: u64 = counts.values().sum();

    counts
        .into_iter()
        .map(|(k, count)| {
            let share = IntersectionShare {
                count,
                proportion: ratio(count as f64, total as f64),
            };
            (k, share)
        })
        .collect()
}
