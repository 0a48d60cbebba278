//! GraphML encoding of street graphs
//!
//! The layout follows the OSMnx/NetworkX convention so artifacts can be
//! exchanged with that tooling: node attributes `x`/`y`, edge attributes
//! `osmid`/`length`/`oneway` and a graph-level `crs`. Key ids are resolved
//! through the `<key>` declarations, never assumed.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{StreetEdge, StreetGraph, GEOGRAPHIC_CRS};

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("cannot read graph file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed GraphML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed GraphML attribute: {0}")]
    Attr(#[from] AttrError),

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },

    #[error("edge references unknown node {0}")]
    UnknownNode(i64),
}

#[derive(Default)]
struct PendingElement {
    attrs: HashMap<String, String>,
    data: HashMap<String, String>,
}

enum Scope {
    Graph,
    Node(PendingElement),
    Edge(PendingElement),
}

/// Read a GraphML artifact from disk
pub fn read_graphml_file(path: &Path) -> Result<StreetGraph, GraphError> {
    let text = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_graphml(&text)
}

/// Parse a GraphML document into a [`StreetGraph`]
pub fn read_graphml(text: &str) -> Result<StreetGraph, GraphError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    // key id -> attribute name
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut graph_data: HashMap<String, String> = HashMap::new();
    let mut nodes: Vec<PendingElement> = Vec::new();
    let mut edges: Vec<PendingElement> = Vec::new();

    let mut scope = Scope::Graph;
    let mut data_key: Option<String> = None;

    loop {
        let (start, is_empty) = match reader.read_event()? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Text(t) => {
                if let Some(key) = data_key.as_ref() {
                    let value = t.unescape()?.into_owned();
                    let name = keys.get(key).cloned().unwrap_or_else(|| key.clone());
                    match &mut scope {
                        Scope::Graph => graph_data.insert(name, value),
                        Scope::Node(p) | Scope::Edge(p) => p.data.insert(name, value),
                    };
                }
                continue;
            }
            Event::End(e) => {
                match e.name().as_ref() {
                    b"data" => data_key = None,
                    b"node" | b"edge" => close_scope(&mut scope, &mut nodes, &mut edges),
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match start.name().as_ref() {
            b"key" => {
                let id = required_attr(&start, "key", "id")?;
                let name = attribute(&start, b"attr.name")?.unwrap_or_else(|| id.clone());
                keys.insert(id, name);
            }
            b"node" => {
                scope = Scope::Node(PendingElement {
                    attrs: all_attributes(&start)?,
                    data: HashMap::new(),
                });
                if is_empty {
                    close_scope(&mut scope, &mut nodes, &mut edges);
                }
            }
            b"edge" => {
                scope = Scope::Edge(PendingElement {
                    attrs: all_attributes(&start)?,
                    data: HashMap::new(),
                });
                if is_empty {
                    close_scope(&mut scope, &mut nodes, &mut edges);
                }
            }
            b"data" if !is_empty => {
                data_key = Some(required_attr(&start, "data", "key")?);
            }
            _ => {}
        }
    }

    let crs = graph_data
        .remove("crs")
        .unwrap_or_else(|| GEOGRAPHIC_CRS.to_string());
    let mut graph = StreetGraph::new(crs);

    for node in nodes {
        let id = parse_id(node.attrs.get("id"), "node", "id")?;
        let x = parse_coord("x", node.data.get("x"))?;
        let y = parse_coord("y", node.data.get("y"))?;
        graph.add_node(id, x, y);
    }

    for edge in edges {
        let source = parse_id(edge.attrs.get("source"), "edge", "source")?;
        let target = parse_id(edge.attrs.get("target"), "edge", "target")?;
        let attrs = StreetEdge {
            osm_id: edge.data.get("osmid").and_then(|v| parse_osmid(v)),
            length: parse_f64("length", edge.data.get("length"))?,
            oneway: edge.data.get("oneway").map(|v| parse_bool(v)).unwrap_or(false),
        };
        if !graph.add_edge(source, target, attrs) {
            let missing = if graph.contains_node(source) { target } else { source };
            return Err(GraphError::UnknownNode(missing));
        }
    }

    Ok(graph)
}

fn close_scope(scope: &mut Scope, nodes: &mut Vec<PendingElement>, edges: &mut Vec<PendingElement>) {
    match std::mem::replace(scope, Scope::Graph) {
        Scope::Node(p) => nodes.push(p),
        Scope::Edge(p) => edges.push(p),
        Scope::Graph => {}
    }
}

fn attribute(start: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, GraphError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(
    start: &BytesStart<'_>,
    element: &'static str,
    attribute_name: &'static str,
) -> Result<String, GraphError> {
    attribute(start, attribute_name.as_bytes())?.ok_or(GraphError::MissingAttribute {
        element,
        attribute: attribute_name,
    })
}

fn all_attributes(start: &BytesStart<'_>) -> Result<HashMap<String, String>, GraphError> {
    let mut map = HashMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        map.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(map)
}

fn parse_id(
    value: Option<&String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<i64, GraphError> {
    let value = value.ok_or(GraphError::MissingAttribute { element, attribute })?;
    value.trim().parse().map_err(|_| GraphError::InvalidValue {
        key: attribute.to_string(),
        value: value.clone(),
    })
}

fn parse_f64(key: &str, value: Option<&String>) -> Result<Option<f64>, GraphError> {
    match value {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| GraphError::InvalidValue {
                key: key.to_string(),
                value: v.clone(),
            }),
    }
}

/// Node coordinate: absent means 0, present must be a finite number
fn parse_coord(key: &str, value: Option<&String>) -> Result<f64, GraphError> {
    match parse_f64(key, value)? {
        None => Ok(0.0),
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(GraphError::InvalidValue {
            key: key.to_string(),
            value: value.cloned().unwrap_or_default(),
        }),
    }
}

/// Merged edges carry a list like `[123, 456]`; the first id is kept
fn parse_osmid(value: &str) -> Option<i64> {
    let trimmed = value.trim().trim_start_matches('[').trim_end_matches(']');
    trimmed.split(',').next()?.trim().parse().ok()
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Serialize a [`StreetGraph`] to a GraphML document
pub fn write_graphml(graph: &StreetGraph) -> Result<Vec<u8>, GraphError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NS)]),
    ))?;

    for (id, domain, name, kind) in [
        ("d0", "graph", "crs", "string"),
        ("d1", "node", "y", "double"),
        ("d2", "node", "x", "double"),
        ("d3", "edge", "osmid", "long"),
        ("d4", "edge", "length", "double"),
        ("d5", "edge", "oneway", "boolean"),
    ] {
        writer
            .create_element("key")
            .with_attributes([
                ("id", id),
                ("for", domain),
                ("attr.name", name),
                ("attr.type", kind),
            ])
            .write_empty()?;
    }

    writer.write_event(Event::Start(
        BytesStart::new("graph").with_attributes([("edgedefault", "directed")]),
    ))?;
    writer
        .create_element("data")
        .with_attribute(("key", "d0"))
        .write_text_content(BytesText::new(graph.crs()))?;

    for node in graph.nodes() {
        let id = node.osm_id.to_string();
        writer.write_event(Event::Start(
            BytesStart::new("node").with_attributes([("id", id.as_str())]),
        ))?;
        write_data(&mut writer, "d1", &node.y.to_string())?;
        write_data(&mut writer, "d2", &node.x.to_string())?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("node")))?;
    }

    // NetworkX numbers parallel edges per (u, v) pair
    let mut parallel: HashMap<(i64, i64), usize> = HashMap::new();
    for (source, target, edge) in graph.edges() {
        let key = parallel.entry((source.osm_id, target.osm_id)).or_insert(0);
        let source_id = source.osm_id.to_string();
        let target_id = target.osm_id.to_string();
        let edge_key = key.to_string();
        *key += 1;

        writer.write_event(Event::Start(BytesStart::new("edge").with_attributes([
            ("source", source_id.as_str()),
            ("target", target_id.as_str()),
            ("id", edge_key.as_str()),
        ])))?;
        if let Some(osm_id) = edge.osm_id {
            write_data(&mut writer, "d3", &osm_id.to_string())?;
        }
        if let Some(length) = edge.length {
            write_data(&mut writer, "d4", &length.to_string())?;
        }
        write_data(&mut writer, "d5", if edge.oneway { "True" } else { "False" })?;
        writer.write_event(Event::End(quick_xml::events::BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("graph")))?;
    writer.write_event(Event::End(quick_xml::events::BytesEnd::new("graphml")))?;

    Ok(writer.into_inner())
}

fn write_data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> Result<(), GraphError> {
    writer
        .create_element("data")
        .with_attribute(("key", key))
        .write_text_content(BytesText::new(value))?;
    Ok(())
}
