//! urbanform: per-city street-network metrics from a world cities catalog
//!
//! The pipeline has four stages, each a separate component with explicit
//! inputs:
//!
//! 1. [`CityCatalog`] loads GeoNames cities and selects a population band.
//! 2. [`GraphCache`] resolves each city to a drivable street graph through a
//!    [`GraphFetcher`] and caches it as GraphML, one file per city.
//! 3. [`MetricsCalculator`] projects a cached graph and computes urban-form
//!    statistics.
//! 4. [`DatasetAggregator`] turns the whole cache into a [`MetricsTable`],
//!    persisted as CSV.
//!
//! # Cache file naming
//!
//! Artifacts are named `{geoname_id}_{name}_{country_code}.graphml`. Names
//! containing `_` cannot be decoded back and are never written; see
//! [`IdentityKey::is_encodable`].
//!
//! # Logging
//!
//! The library logs through `tracing` and never installs a subscriber. The
//! `urbanform` binary logs to stderr, filtered by `RUST_LOG`.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error_codes;
pub mod fetch;
pub mod geometry;
pub mod graph;
pub mod identity;
pub mod metrics;
pub mod output;
pub mod version;

pub use cache::{CacheError, CacheOutcome, CachedGraph, CachedGraphs, FetchProgress, GraphCache};
pub use catalog::{
    CatalogError, CityCatalog, CityRecord, FETCH_POPULATION_RANGE,
};
pub use config::{FetchConfig, PipelineConfig};
pub use dataset::{BuildProgress, DatasetAggregator, DatasetError, MetricsTable};
pub use diagnostics::{CityDiagnostic, PopulateReport, SkipReason};
pub use fetch::{FetchError, GraphFetcher, OverpassFetcher};
pub use geometry::{GeometryOps, PlanarGeometry, UtmGeometry};
pub use graph::{GraphError, StreetEdge, StreetGraph, StreetNode};
pub use identity::{IdentityError, IdentityKey};
pub use metrics::{BasicStats, IntersectionShare, MetricsCalculator, MetricsRecord};
pub use output::{generate_execution_id, output_json, JsonResponse, OutputFormat};
