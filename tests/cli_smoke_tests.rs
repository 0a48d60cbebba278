//! CLI smoke tests for the urbanform binary
//!
//! Every test works on a temp data directory and never touches the network:
//! fetch is only exercised on cities that are already cached or cannot be
//! encoded.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use urbanform::{GraphCache, IdentityKey, StreetEdge, StreetGraph};

fn bin_path() -> String {
    std::env::var("CARGO_BIN_EXE_urbanform").unwrap_or_else(|_| {
        let mut path = std::env::current_exe().unwrap();
        path.pop();
        path.pop();
        path.push("urbanform");
        path.to_str().unwrap().to_string()
    })
}

fn run(args: &[&str], data_dir: &Path) -> Output {
    Command::new(bin_path())
        .args(args)
        .arg("--data-dir")
        .arg(data_dir)
        .env("RUST_LOG", "urbanform=warn")
        .output()
        .expect("Failed to execute urbanform")
}

fn json_data(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"));
    assert_eq!(parsed["tool"], "urbanform");
    parsed["data"].clone()
}

/// Small lon/lat block near Lyon with two-way streets
fn block_graph(offset: f64) -> StreetGraph {
    let mut graph = StreetGraph::default();
    let (lon, lat) = (4.83 + offset, 45.76);
    graph.add_node(1, lon, lat);
    graph.add_node(2, lon + 0.002, lat);
    graph.add_node(3, lon + 0.002, lat + 0.002);
    graph.add_node(4, lon, lat + 0.002);
    for (u, v) in [(1, 2), (2, 3), (3, 4), (4, 1), (1, 3)] {
        graph.add_edge(u, v, StreetEdge::default());
        graph.add_edge(v, u, StreetEdge::default());
    }
    graph
}

fn write_catalog(data_dir: &Path) {
    let geojson = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"geoname_id": "2996944", "name": "Lyon", "country_code": "FR", "population": 105000},
             "geometry": {"type": "Point", "coordinates": [4.83, 45.76]}},
            {"type": "Feature", "properties": {"geoname_id": 3031582, "name": "Bourg_en_Bresse", "country_code": "FR", "population": 101000},
             "geometry": null},
            {"type": "Feature", "properties": {"geoname_id": 2988507, "name": "Paris", "country_code": "FR", "population": 2138551},
             "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}}
        ]
    }"#;
    fs::create_dir_all(data_dir).unwrap();
    fs::write(
        data_dir.join("geonames-all-cities-with-a-population-1000.geojson"),
        geojson,
    )
    .unwrap();
}

#[test]
fn test_version_flag() {
    let output = Command::new(bin_path()).arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("urbanform "), "unexpected: {stdout}");
}

#[test]
fn test_unknown_command_fails() {
    let output = Command::new(bin_path()).arg("index").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_arguments_report_json_error_code() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(&["cities", "--limit", "many", "--output", "json"], temp_dir.path());
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"));
    assert_eq!(parsed["data"]["error"], "URB-CLI-001");
    assert!(parsed["data"]["message"].as_str().unwrap().contains("--limit"));
}

#[test]
fn test_status_on_empty_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(&["status", "--output", "json"], temp_dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let data = json_data(&output);
    assert_eq!(data["cached_graphs"], 0);
    assert_eq!(data["catalog_present"], false);
    assert!(data.get("table_rows").is_none());
}

#[test]
fn test_cities_lists_population_band() {
    let temp_dir = TempDir::new().unwrap();
    write_catalog(temp_dir.path());

    let output = run(&["cities", "--output", "json"], temp_dir.path());
    assert!(output.status.success());
    let data = json_data(&output);
    assert_eq!(data["total"], 2);
    let names: Vec<&str> = data["cities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Lyon"));
    assert!(!names.contains(&"Paris"));
}

#[test]
fn test_fetch_without_catalog_reports_error_code() {
    let temp_dir = TempDir::new().unwrap();
    let output = run(&["fetch", "--output", "json", "--no-progress"], temp_dir.path());
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["data"]["error"], "URB-CAT-001");
}

#[test]
fn test_fetch_skips_cached_and_unencodable_cities_offline() {
    let temp_dir = TempDir::new().unwrap();
    write_catalog(temp_dir.path());
    let cache = GraphCache::new(temp_dir.path().join("cities_graphs"));
    cache.ensure_dir().unwrap();
    cache
        .store(&IdentityKey::new(2996944, "Lyon", "FR"), &block_graph(0.0))
        .unwrap();

    let output = run(&["fetch", "--output", "json", "--no-progress"], temp_dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let data = json_data(&output);
    assert_eq!(data["requested"], 2);
    assert_eq!(data["already_cached"], 1);
    assert_eq!(data["skipped"], 1);
    assert_eq!(data["diagnostics"][0]["reason"]["kind"], "unencodable_name");
}

#[test]
fn test_compute_over_seeded_cache() {
    let temp_dir = TempDir::new().unwrap();
    let cache = GraphCache::new(temp_dir.path().join("cities_graphs"));
    cache.ensure_dir().unwrap();
    cache
        .store(&IdentityKey::new(2996944, "Lyon", "FR"), &block_graph(0.0))
        .unwrap();
    cache
        .store(&IdentityKey::new(3014728, "Grenoble", "FR"), &block_graph(0.9))
        .unwrap();
    fs::write(temp_dir.path().join("cities_graphs").join("stray.graphml"), "<graphml/>").unwrap();

    let output = run(&["compute", "--output", "json", "--no-progress"], temp_dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let data = json_data(&output);
    assert_eq!(data["cities"], 2);
    assert_eq!(data["degrees"], serde_json::json!([2, 3]));
    assert_eq!(data["skipped_files"].as_array().unwrap().len(), 1);

    let table_path = temp_dir.path().join("processed").join("stats.csv");
    let csv = fs::read_to_string(&table_path).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("geoname_id,name,country_code,n,m,"));
    assert!(header.ends_with("2_way_int_count,3_way_int_count,2_way_int_prop,3_way_int_prop"));
    assert_eq!(csv.lines().count(), 3);

    let status = run(&["status", "--output", "json"], temp_dir.path());
    let data = json_data(&status);
    assert_eq!(data["cached_graphs"], 2);
    assert_eq!(data["undecodable_files"], 1);
    assert_eq!(data["table_rows"], 2);
}
