//! Status command implementation
//!
//! Reports what is on disk: the catalog, cached graphs and the table. Never
//! fetches or computes anything.

use anyhow::Result;
use urbanform::output::{generate_execution_id, output_json, JsonResponse, StatusResponse};
use urbanform::{DatasetAggregator, GraphCache, MetricsCalculator, OutputFormat, PipelineConfig, UtmGeometry};

pub fn run_status(config: PipelineConfig, output_format: OutputFormat) -> Result<()> {
    let cache = GraphCache::new(&config.cache_dir);
    let graphs = cache.iterate_cached()?;
    let cached_graphs = graphs.len();
    let undecodable_files = graphs.skipped().len();

    let table_path = config.table_path();
    let table_rows = if table_path.exists() {
        let aggregator = DatasetAggregator::new(
            cache.clone(),
            MetricsCalculator::new(UtmGeometry),
            table_path.clone(),
        );
        Some(aggregator.load()?.len())
    } else {
        None
    };

    let response = StatusResponse {
        catalog_path: config.catalog_path.display().to_string(),
        catalog_present: config.catalog_path.is_file(),
        cache_dir: config.cache_dir.display().to_string(),
        cached_graphs,
        undecodable_files,
        table_path: table_path.display().to_string(),
        table_rows,
    };

    match output_format {
        OutputFormat::Json => output_json(&JsonResponse::new(response, &generate_execution_id())),
        OutputFormat::Human => {
            println!(
                "catalog: {}{}",
                response.catalog_path,
                if response.catalog_present { "" } else { " (missing)" }
            );
            println!("cached graphs: {}", response.cached_graphs);
            if response.undecodable_files > 0 {
                println!("undecodable cache files: {}", response.undecodable_files);
            }
            match response.table_rows {
                Some(rows) => println!("table: {} ({} cities)", response.table_path, rows),
                None => println!("table: {} (not built)", response.table_path),
            }
            Ok(())
        }
    }
}
