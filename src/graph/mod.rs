//! Street network graph model
//!
//! A [`StreetGraph`] is a directed multigraph: nodes are intersections or
//! dead ends, edges are drivable road segments. Parallel edges are allowed,
//! as are self-loops. Coordinates are either geographic (x = longitude,
//! y = latitude, [`GEOGRAPHIC_CRS`]) or planar metres after projection.

pub mod graphml;
pub mod streets;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

pub use graphml::{read_graphml, read_graphml_file, write_graphml, GraphError};
pub use streets::{street_segments, streets_per_node, StreetSegment};

/// CRS label of unprojected lon/lat graphs
pub const GEOGRAPHIC_CRS: &str = "epsg:4326";

/// An intersection or dead end
#[derive(Debug, Clone, PartialEq)]
pub struct StreetNode {
    /// OpenStreetMap node id
    pub osm_id: i64,
    pub x: f64,
    pub y: f64,
}

/// A directed road segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreetEdge {
    /// OpenStreetMap way id the segment was cut from
    pub osm_id: Option<i64>,
    /// Length in metres, when known
    pub length: Option<f64>,
    pub oneway: bool,
}

/// Directed street multigraph keyed by OSM node id
#[derive(Debug, Clone)]
pub struct StreetGraph {
    graph: DiGraph<StreetNode, StreetEdge>,
    index: HashMap<i64, NodeIndex>,
    crs: String,
}

impl Default for StreetGraph {
    fn default() -> Self {
        Self::new(GEOGRAPHIC_CRS)
    }
}

impl StreetGraph {
    pub fn new(crs: impl Into<String>) -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            crs: crs.into(),
        }
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    /// Whether coordinates are planar (anything other than lon/lat)
    pub fn is_projected(&self) -> bool {
        !self.crs.eq_ignore_ascii_case(GEOGRAPHIC_CRS)
    }

    /// Add a node, or move an existing node with the same OSM id
    pub fn add_node(&mut self, osm_id: i64, x: f64, y: f64) -> NodeIndex {
        if let Some(&idx) = self.index.get(&osm_id) {
            self.graph[idx].x = x;
            self.graph[idx].y = y;
            return idx;
        }
        let idx = self.graph.add_node(StreetNode { osm_id, x, y });
        self.index.insert(osm_id, idx);
        idx
    }

    /// Add an edge between two existing nodes
    ///
    /// Returns `false` (and adds nothing) if either endpoint is unknown.
    pub fn add_edge(&mut self, from: i64, to: i64, edge: StreetEdge) -> bool {
        match (self.index.get(&from), self.index.get(&to)) {
            (Some(&u), Some(&v)) => {
                self.graph.add_edge(u, v, edge);
                true
            }
            _ => false,
        }
    }

    pub fn contains_node(&self, osm_id: i64) -> bool {
        self.index.contains_key(&osm_id)
    }

    pub fn node(&self, osm_id: i64) -> Option<&StreetNode> {
        self.index.get(&osm_id).map(|&idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &StreetNode> + '_ {
        self.graph.node_weights()
    }

    /// Edges as `(source, target, attributes)`
    pub fn edges(&self) -> impl Iterator<Item = (&StreetNode, &StreetNode, &StreetEdge)> + '_ {
        self.graph
            .edge_references()
            .map(move |e| (&self.graph[e.source()], &self.graph[e.target()], e.weight()))
    }

    /// Node positions as planar coordinates
    pub fn positions(&self) -> Vec<geo::Coord<f64>> {
        self.nodes().map(|n| geo::coord! { x: n.x, y: n.y }).collect()
    }

    /// Copy of the graph with every node position passed through `f`
    ///
    /// Edge attributes, including stored lengths, are kept as they are.
    pub fn map_positions<F>(&self, crs: impl Into<String>, mut f: F) -> StreetGraph
    where
        F: FnMut(f64, f64) -> (f64, f64),
    {
        let mut graph = self.graph.clone();
        for node in graph.node_weights_mut() {
            let (x, y) = f(node.x, node.y);
            node.x = x;
            node.y = y;
        }
        StreetGraph {
            graph,
            index: self.index.clone(),
            crs: crs.into(),
        }
    }

    /// Underlying petgraph structure
    pub fn inner(&self) -> &DiGraph<StreetNode, StreetEdge> {
        &self.graph
    }
}
