//! Fetch command implementation
//!
//! Populates the graph cache for a population band. Cities already cached
//! are not fetched again, so an interrupted run can simply be restarted.

use anyhow::{Context, Result};
use urbanform::output::{generate_execution_id, output_json, FetchResponse, JsonResponse};
use urbanform::{CityCatalog, FetchConfig, GraphCache, IdentityKey, OutputFormat, OverpassFetcher, PipelineConfig};

use crate::cities_cmd::select_cities;
use crate::cli::BandArgs;
use crate::progress::city_bar;

pub fn run_fetch(
    config: PipelineConfig,
    fetch: FetchConfig,
    band: BandArgs,
    progress: bool,
    output_format: OutputFormat,
) -> Result<()> {
    let catalog = CityCatalog::load(&config.catalog_path)
        .with_context(|| format!("loading catalog {}", config.catalog_path.display()))?;
    let (cities, total) = select_cities(&catalog, &band);
    tracing::info!(
        selected = cities.len(),
        band_total = total,
        from = band.from,
        to = band.to,
        "fetching street graphs"
    );

    let fetcher = OverpassFetcher::new(fetch).context("setting up HTTP client")?;
    let cache = GraphCache::new(&config.cache_dir);

    let pb = city_bar(cities.len(), "fetching", progress)?;
    let on_city = |_current: usize, _total: usize, city: &IdentityKey| {
        pb.set_message(format!("{}, {}", city.name, city.country_code));
        pb.inc(1);
    };
    let report = cache.populate(&cities, &fetcher, Some(&on_city))?;
    pb.finish_and_clear();

    match output_format {
        OutputFormat::Json => {
            let json = JsonResponse::new(FetchResponse::from(&report), &generate_execution_id());
            output_json(&json)
        }
        OutputFormat::Human => {
            for diagnostic in &report.diagnostics {
                eprintln!("{}", diagnostic.format_stderr());
            }
            println!(
                "{} requested: {} cached, {} already cached, {} skipped, {} failed",
                report.requested(),
                report.cached.len(),
                report.already_cached.len(),
                report.skipped_count(),
                report.failed_count()
            );
            Ok(())
        }
    }
}
