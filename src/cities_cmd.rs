//! Cities command implementation
//!
//! Lists the catalog cities whose population falls in a band, the same
//! selection `fetch` would work on.

use anyhow::{Context, Result};
use urbanform::output::{generate_execution_id, output_json, CitiesResponse, CityEntry, JsonResponse};
use urbanform::{CityCatalog, CityRecord, OutputFormat, PipelineConfig};

use crate::cli::BandArgs;

/// Load the catalog and select the band, honouring `--limit`
///
/// Returns the selected cities and the band size before the limit.
pub fn select_cities<'a>(catalog: &'a CityCatalog, band: &BandArgs) -> (Vec<&'a CityRecord>, usize) {
    let mut cities = catalog.filter_by_population(band.from, band.to);
    let total = cities.len();
    if let Some(limit) = band.limit {
        cities.truncate(limit);
    }
    (cities, total)
}

pub fn run_cities(config: PipelineConfig, band: BandArgs, output_format: OutputFormat) -> Result<()> {
    let catalog = CityCatalog::load(&config.catalog_path)
        .with_context(|| format!("loading catalog {}", config.catalog_path.display()))?;
    let (cities, total) = select_cities(&catalog, &band);

    match output_format {
        OutputFormat::Json => {
            let response = CitiesResponse {
                from: band.from,
                to: band.to,
                total,
                cities: cities.iter().map(|c| CityEntry::from(*c)).collect(),
            };
            let json = JsonResponse::new(response, &generate_execution_id())
                .with_partial(cities.len() < total);
            output_json(&json)
        }
        OutputFormat::Human => {
            for city in &cities {
                println!(
                    "{:>10}  {:<32} {:<3} {:>10}",
                    city.geoname_id, city.name, city.country_code, city.population
                );
            }
            println!(
                "{} of {} cities with population {}..={}",
                cities.len(),
                total,
                band.from,
                band.to
            );
            Ok(())
        }
    }
}
