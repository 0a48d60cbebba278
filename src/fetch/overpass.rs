//! Nominatim + Overpass backed [`GraphFetcher`]
//!
//! Resolution happens in two sequential, blocking requests:
//! 1. Nominatim geocodes `"{name}, {country_code}"`; the first result that is
//!    an OSM relation or way (i.e. an area) wins.
//! 2. Overpass returns every drivable way inside that area plus its nodes.
//!
//! Ways are split at shared nodes and endpoints, which become the graph
//! nodes. Segment length is the summed great-circle distance along the way.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::thread;

use super::{place_query, FetchError, GraphFetcher};
use crate::config::FetchConfig;
use crate::geometry::haversine_m;
use crate::graph::{StreetEdge, StreetGraph, GEOGRAPHIC_CRS};

/// Overpass area ids are offset OSM ids
const RELATION_AREA_OFFSET: i64 = 3_600_000_000;
const WAY_AREA_OFFSET: i64 = 2_400_000_000;

/// Way filter for streets open to private motor vehicles
const DRIVE_FILTER: &str = concat!(
    r#"["highway"]["area"!~"yes"]"#,
    r#"["highway"!~"abandoned|bridleway|bus_guideway|construction|corridor|cycleway|elevator|escalator|footway|no|path|pedestrian|planned|platform|proposed|raceway|razed|service|steps|track"]"#,
    r#"["motor_vehicle"!~"no"]["motorcar"!~"no"]"#,
    r#"["service"!~"alley|driveway|emergency_access|parking|parking_aisle|private"]"#,
);

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    osm_type: String,
    osm_id: i64,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

/// One element of an Overpass JSON response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// Fetcher talking to public (or self-hosted) Nominatim and Overpass endpoints
pub struct OverpassFetcher {
    client: Client,
    config: FetchConfig,
}

impl OverpassFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn pause(&self) {
        if !self.config.request_delay.is_zero() {
            thread::sleep(self.config.request_delay);
        }
    }

    /// Overpass area id of the first areal geocoding result
    fn geocode_area(&self, query: &str) -> Result<i64, FetchError> {
        self.pause();
        let places: Vec<NominatimPlace> = self
            .client
            .get(&self.config.nominatim_url)
            .query(&[("q", query), ("format", "json"), ("limit", "10")])
            .send()?
            .error_for_status()?
            .json()?;

        if places.is_empty() {
            return Err(FetchError::NotFound(query.to_string()));
        }

        places
            .iter()
            .find_map(|place| match place.osm_type.as_str() {
                "relation" => Some(RELATION_AREA_OFFSET + place.osm_id),
                "way" => Some(WAY_AREA_OFFSET + place.osm_id),
                _ => None,
            })
            .ok_or_else(|| FetchError::NotAPolygon(query.to_string()))
    }

    fn drivable_elements(&self, area_id: i64) -> Result<Vec<OverpassElement>, FetchError> {
        let timeout_secs = self.config.timeout.as_secs().max(1);
        let query = format!(
            "[out:json][timeout:{timeout_secs}];area(id:{area_id})->.searchArea;\
             (way{DRIVE_FILTER}(area.searchArea););(._;>;);out;"
        );

        self.pause();
        let response: OverpassResponse = self
            .client
            .post(&self.config.overpass_url)
            .form(&[("data", query)])
            .send()?
            .error_for_status()?
            .json()
            .map_err(|e| FetchError::Decode {
                service: "overpass",
                message: e.to_string(),
            })?;
        Ok(response.elements)
    }
}

impl GraphFetcher for OverpassFetcher {
    fn resolve(&self, name: &str, country_code: &str) -> Result<StreetGraph, FetchError> {
        let query = place_query(name, country_code);
        let area_id = self.geocode_area(&query)?;
        tracing::debug!(%query, area_id, "geocoded place");

        let elements = self.drivable_elements(area_id)?;
        let graph = build_drive_graph(&elements);
        if graph.edge_count() == 0 {
            return Err(FetchError::EmptyNetwork(query));
        }
        tracing::debug!(
            %query,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built street graph"
        );
        Ok(graph)
    }
}

enum Direction {
    Forward,
    Reverse,
    Both,
}

fn direction(tags: &HashMap<String, String>) -> Direction {
    match tags.get("oneway").map(|v| v.as_str()) {
        Some("yes" | "true" | "1") => Direction::Forward,
        Some("-1" | "reverse") => Direction::Reverse,
        _ if tags.get("junction").map(|v| v.as_str()) == Some("roundabout") => Direction::Forward,
        _ => Direction::Both,
    }
}

/// Build a street graph from Overpass elements
///
/// Ways referencing nodes absent from the response are truncated to their
/// known nodes; ways left with fewer than two nodes are dropped.
pub fn build_drive_graph(elements: &[OverpassElement]) -> StreetGraph {
    let mut coords: HashMap<i64, (f64, f64)> = HashMap::new();
    let mut ways: Vec<(i64, Vec<i64>, &HashMap<String, String>)> = Vec::new();

    for element in elements {
        match element {
            OverpassElement::Node { id, lat, lon } => {
                coords.insert(*id, (*lon, *lat));
            }
            OverpassElement::Way { id, nodes, tags } => ways.push((*id, nodes.clone(), tags)),
            OverpassElement::Other => {}
        }
    }

    for (_, nodes, _) in ways.iter_mut() {
        nodes.retain(|n| coords.contains_key(n));
    }
    ways.retain(|(_, nodes, _)| nodes.len() >= 2);

    // Graph nodes: way endpoints and nodes used more than once
    let mut usage: HashMap<i64, u32> = HashMap::new();
    let mut keep: HashSet<i64> = HashSet::new();
    for (_, nodes, _) in &ways {
        for node in nodes {
            *usage.entry(*node).or_insert(0) += 1;
        }
        keep.insert(nodes[0]);
        keep.insert(nodes[nodes.len() - 1]);
    }
    keep.extend(usage.iter().filter(|&(_, count)| *count > 1).map(|(id, _)| *id));

    let mut graph = StreetGraph::new(GEOGRAPHIC_CRS);
    for (way_id, nodes, tags) in &ways {
        let dir = direction(tags);
        let oneway = !matches!(dir, Direction::Both);

        let mut start = nodes[0];
        let mut length = 0.0;
        for pair in nodes.windows(2) {
            let (lon1, lat1) = coords[&pair[0]];
            let (lon2, lat2) = coords[&pair[1]];
            length += haversine_m(lon1, lat1, lon2, lat2);

            let current = pair[1];
            if !keep.contains(&current) {
                continue;
            }

            for id in [start, current] {
                if !graph.contains_node(id) {
                    let (lon, lat) = coords[&id];
                    graph.add_node(id, lon, lat);
                }
            }
            let edge = StreetEdge {
                osm_id: Some(*way_id),
                length: Some(length),
                oneway,
            };
            match dir {
                Direction::Forward => {
                    graph.add_edge(start, current, edge);
                }
                Direction::Reverse => {
                    graph.add_edge(current, start, edge);
                }
                Direction::Both => {
                    graph.add_edge(start, current, edge.clone());
                    graph.add_edge(current, start, edge);
                }
            }

            start = current;
            length = 0.0;
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, lon: f64, lat: f64) -> OverpassElement {
        OverpassElement::Node { id, lat, lon }
    }

    fn way(id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> OverpassElement {
        OverpassElement::Way {
            id,
            nodes: nodes.to_vec(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_parse_overpass_json() {
        let json = r#"{"elements":[
            {"type":"node","id":1,"lat":48.0,"lon":2.0},
            {"type":"way","id":9,"nodes":[1,2],"tags":{"highway":"primary"}},
            {"type":"relation","id":3}
        ]}"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.elements.len(), 3);
        assert!(matches!(response.elements[2], OverpassElement::Other));
    }

    #[test]
    fn test_interior_nodes_are_collapsed() {
        let elements = vec![
            node(1, 0.0, 0.0),
            node(2, 0.001, 0.0),
            node(3, 0.002, 0.0),
            way(10, &[1, 2, 3], &[("highway", "residential")]),
        ];
        let graph = build_drive_graph(&elements);

        assert_eq!(graph.node_count(), 2, "only endpoints kept");
        assert_eq!(graph.edge_count(), 2, "two-way street gives reciprocal edges");
        let (_, _, edge) = graph.edges().next().unwrap();
        let expected = haversine_m(0.0, 0.0, 0.002, 0.0);
        assert!((edge.length.unwrap() - expected).abs() < 1e-6);
        assert!(!edge.oneway);
    }

    #[test]
    fn test_shared_node_splits_ways() {
        let elements = vec![
            node(1, 0.0, 0.0),
            node(2, 0.001, 0.0),
            node(3, 0.002, 0.0),
            node(4, 0.001, 0.001),
            way(10, &[1, 2, 3], &[("highway", "residential"), ("oneway", "yes")]),
            way(11, &[2, 4], &[("highway", "residential"), ("oneway", "-1")]),
        ];
        let graph = build_drive_graph(&elements);

        assert_eq!(graph.node_count(), 4);
        let edges: Vec<(i64, i64)> = graph.edges().map(|(u, v, _)| (u.osm_id, v.osm_id)).collect();
        assert!(edges.contains(&(1, 2)));
        assert!(edges.contains(&(2, 3)));
        assert!(edges.contains(&(4, 2)), "reverse oneway flips direction");
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn test_ways_with_missing_nodes_are_dropped() {
        let elements = vec![node(1, 0.0, 0.0), way(10, &[1, 99], &[("highway", "primary")])];
        let graph = build_drive_graph(&elements);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_roundabout_is_oneway() {
        let tags: HashMap<String, String> =
            [("junction".to_string(), "roundabout".to_string())].into_iter().collect();
        assert!(matches!(direction(&tags), Direction::Forward));
    }
}
