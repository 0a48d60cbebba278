//! Dataset aggregation: cached graphs in, one metrics table out
//!
//! [`DatasetAggregator::build`] walks the graph cache, computes a
//! [`MetricsRecord`](crate::metrics::MetricsRecord) per city and collects them
//! into a [`MetricsTable`] keyed by geoname id. The table is persisted as CSV
//! and can be read back losslessly.

pub mod table;

use std::path::{Path, PathBuf};

use crate::cache::{CacheError, GraphCache};
use crate::geometry::{GeometryOps, UtmGeometry};
use crate::identity::IdentityKey;
use crate::metrics::MetricsCalculator;

pub use table::MetricsTable;

/// Progress callback for [`DatasetAggregator::build_with_progress`]
///
/// Receives (current_count, total_count, city) after each city is computed.
pub type BuildProgress<'a> = dyn Fn(usize, usize, &IdentityKey) + 'a;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("geoname id {} appears twice: {first} and {second}", .first.geoname_id)]
    DuplicateGeonameId {
        first: IdentityKey,
        second: IdentityKey,
    },

    #[error("table is missing column '{0}'")]
    MissingColumn(String),

    #[error("table has unknown column '{0}'")]
    UnknownColumn(String),

    #[error("table has column '{0}' more than once")]
    DuplicateColumn(String),

    #[error("line {line}, column '{column}': cannot parse '{value}'")]
    InvalidCell {
        line: u64,
        column: String,
        value: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DatasetError {
    let path = path.to_path_buf();
    move |source| DatasetError::Io { path, source }
}

/// Builds, persists and reloads the metrics table
#[derive(Debug, Clone)]
pub struct DatasetAggregator<G = UtmGeometry> {
    cache: GraphCache,
    calculator: MetricsCalculator<G>,
    table_path: PathBuf,
}

impl<G: GeometryOps> DatasetAggregator<G> {
    pub fn new(cache: GraphCache, calculator: MetricsCalculator<G>, table_path: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            calculator,
            table_path: table_path.into(),
        }
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Compute metrics for every cached graph
    pub fn build(&self) -> Result<MetricsTable, DatasetError> {
        self.build_with_progress(None)
    }

    /// Like [`build`](Self::build), reporting each finished city
    ///
    /// Fails on the first unreadable graph or repeated geoname id. Cache
    /// files whose names do not decode are skipped (see
    /// [`CachedGraphs::skipped`](crate::cache::CachedGraphs::skipped)).
    pub fn build_with_progress(&self, progress: Option<&BuildProgress<'_>>) -> Result<MetricsTable, DatasetError> {
        let graphs = self.cache.iterate_cached()?;
        let total = graphs.len();
        let skipped = graphs.skipped().len();

        let mut table = MetricsTable::new();
        for (idx, item) in graphs.enumerate() {
            let cached = item?;
            let record = self.calculator.compute(&cached.graph, &cached.identity);
            table.insert(record)?;
            if let Some(cb) = progress {
                cb(idx + 1, total, &cached.identity);
            }
        }

        tracing::info!(cities = table.len(), skipped_files = skipped, "built metrics table");
        Ok(table)
    }

    /// Write the table as CSV, replacing any previous table atomically
    pub fn persist(&self, table: &MetricsTable) -> Result<(), DatasetError> {
        let dir = match self.table_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".stats")
            .suffix(".partial")
            .tempfile_in(&dir)
            .map_err(io_err(&dir))?;
        table.write_csv(&mut tmp)?;
        tmp.as_file().sync_all().map_err(io_err(tmp.path()))?;
        tmp.persist(&self.table_path)
            .map_err(|e| DatasetError::Io {
                path: self.table_path.clone(),
                source: e.error,
            })?;

        tracing::info!(path = %self.table_path.display(), rows = table.len(), "persisted metrics table");
        Ok(())
    }

    /// Read a previously persisted table
    pub fn load(&self) -> Result<MetricsTable, DatasetError> {
        let file = std::fs::File::open(&self.table_path).map_err(|source| DatasetError::Io {
            path: self.table_path.clone(),
            source,
        })?;
        MetricsTable::read_csv(std::io::BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PlanarGeometry;
    use crate::graph::{StreetEdge, StreetGraph};

    fn triangle() -> StreetGraph {
        let mut graph = StreetGraph::new("planar");
        graph.add_node(1, 0.0, 0.0);
        graph.add_node(2, 10.0, 0.0);
        graph.add_node(3, 0.0, 10.0);
        graph.add_edge(1, 2, StreetEdge::default());
        graph.add_edge(2, 3, StreetEdge::default());
        graph.add_edge(3, 1, StreetEdge::default());
        graph
    }

    fn aggregator(dir: &Path) -> DatasetAggregator<PlanarGeometry> {
        let cache = GraphCache::new(dir.join("graphs"));
        cache.ensure_dir().unwrap();
        DatasetAggregator::new(
            cache,
            MetricsCalculator::new(PlanarGeometry),
            dir.join("processed").join("stats.csv"),
        )
    }

    #[test]
    fn test_build_from_empty_cache() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let table = aggregator(temp_dir.path()).build().unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_build_persist_load() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let agg = aggregator(temp_dir.path());
        agg.cache().store(&IdentityKey::new(3, "Dijon", "FR"), &triangle()).unwrap();
        agg.cache().store(&IdentityKey::new(1, "Brest", "FR"), &triangle()).unwrap();

        let table = agg.build().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(3).unwrap().identity.name, "Dijon");

        agg.persist(&table).unwrap();
        assert_eq!(agg.load().unwrap(), table);
    }

    #[test]
    fn test_build_fails_on_duplicate_geoname_id() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let agg = aggregator(temp_dir.path());
        agg.cache().store(&IdentityKey::new(5, "Metz", "FR"), &triangle()).unwrap();
        agg.cache().store(&IdentityKey::new(5, "Metz", "DE"), &triangle()).unwrap();

        let err = agg.build().unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateGeonameId { .. }));
    }

    #[test]
    fn test_progress_reports_every_city() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let agg = aggregator(temp_dir.path());
        agg.cache().store(&IdentityKey::new(1, "Brest", "FR"), &triangle()).unwrap();

        let calls = std::cell::Cell::new(0);
        let progress = |current: usize, total: usize, _: &IdentityKey| {
            assert_eq!((current, total), (1, 1));
            calls.set(calls.get() + 1);
        };
        agg.build_with_progress(Some(&progress)).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_load_missing_table_is_io_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = aggregator(temp_dir.path()).load().unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
