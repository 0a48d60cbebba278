//! Undirected street view of a directed street graph
//!
//! Between two nodes `a` and `b` the number of physical streets is
//! `max(edges a->b, edges b->a)`: a two-way road stored as a reciprocal
//! pair of edges is one street, parallel roads stay separate. A self-loop
//! is one street incident to its node.

use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use super::{StreetEdge, StreetGraph};

/// One undirected street between two nodes (OSM ids)
#[derive(Debug, Clone, PartialEq)]
pub struct StreetSegment {
    pub from: i64,
    pub to: i64,
    pub edge: StreetEdge,
}

impl StreetSegment {
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Collapse reciprocal edges into undirected streets
///
/// Output order is stable (by node insertion order of the endpoints).
pub fn street_segments(graph: &StreetGraph) -> Vec<StreetSegment> {
    let inner = graph.inner();

    // (low, high) node index -> (edges low->high, edges high->low)
    let mut pairs: BTreeMap<(usize, usize), (Vec<&StreetEdge>, Vec<&StreetEdge>)> = BTreeMap::new();
    for edge in inner.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        if u <= v {
            pairs.entry((u, v)).or_default().0.push(edge.weight());
        } else {
            pairs.entry((v, u)).or_default().1.push(edge.weight());
        }
    }

    let mut segments = Vec::new();
    for ((low, high), (forward, reverse)) in pairs {
        let from = inner[petgraph::graph::NodeIndex::new(low)].osm_id;
        let to = inner[petgraph::graph::NodeIndex::new(high)].osm_id;
        let kept = if reverse.len() > forward.len() { reverse } else { forward };
        segments.extend(kept.into_iter().map(|edge| StreetSegment {
            from,
            to,
            edge: edge.clone(),
        }));
    }
    segments
}

/// Number of streets incident to every node, keyed by OSM id
///
/// Isolated nodes are present with a count of 0.
pub fn streets_per_node(graph: &StreetGraph) -> HashMap<i64, u32> {
    let mut counts: HashMap<i64, u32> = graph.nodes().map(|n| (n.osm_id, 0)).collect();
    for segment in street_segments(graph) {
        *counts.entry(segment.from).or_insert(0) += 1;
        if !segment.is_self_loop() {
            *counts.entry(segment.to).or_insert(0) += 1;
        }
    }
    counts
}
