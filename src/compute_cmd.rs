//! Compute command implementation
//!
//! Builds the metrics table from every cached graph and persists it.

use anyhow::{Context, Result};
use urbanform::output::{generate_execution_id, output_json, ComputeResponse, JsonResponse};
use urbanform::{DatasetAggregator, GraphCache, IdentityKey, MetricsCalculator, OutputFormat, PipelineConfig, UtmGeometry};

use crate::progress::city_bar;

pub fn run_compute(config: PipelineConfig, progress: bool, output_format: OutputFormat) -> Result<()> {
    let cache = GraphCache::new(&config.cache_dir);
    let scan = cache.iterate_cached()?;
    let skipped_files: Vec<String> = scan.skipped().iter().map(|p| p.display().to_string()).collect();

    let aggregator = DatasetAggregator::new(
        cache,
        MetricsCalculator::new(UtmGeometry),
        config.table_path(),
    );

    let pb = city_bar(scan.len(), "computing", progress)?;
    drop(scan);
    let on_city = |_current: usize, _total: usize, city: &IdentityKey| {
        pb.set_message(format!("{}, {}", city.name, city.country_code));
        pb.inc(1);
    };
    let table = aggregator
        .build_with_progress(Some(&on_city))
        .context("building metrics table")?;
    pb.finish_and_clear();

    aggregator
        .persist(&table)
        .with_context(|| format!("writing {}", aggregator.table_path().display()))?;

    let response = ComputeResponse {
        cities: table.len(),
        degrees: table.degrees().into_iter().collect(),
        skipped_files,
        table_path: aggregator.table_path().display().to_string(),
    };

    match output_format {
        OutputFormat::Json => output_json(&JsonResponse::new(response, &generate_execution_id())),
        OutputFormat::Human => {
            for path in &response.skipped_files {
                eprintln!("SKIP {}: file name does not decode", path);
            }
            println!("{} cities written to {}", response.cities, response.table_path);
            Ok(())
        }
    }
}
