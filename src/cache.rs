//! On-disk cache of per-city street graphs
//!
//! The cache directory is the single source of truth: one GraphML file per
//! successfully resolved city, named by its [`IdentityKey`]. There is no
//! in-memory registry; every lookup and every scan goes to the filesystem.
//!
//! # Write discipline
//!
//! Artifacts are written to a hidden temp file in the cache directory and
//! renamed into place without clobbering. A reader scanning the directory
//! therefore sees either no file or a complete one, and two writers racing
//! on the same city end with exactly one artifact.
//!
//! # Thread Safety
//!
//! `GraphCache` holds only a path and is cheap to clone. Population is
//! sequential: each fetch completes before the next city starts.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalog::CityRecord;
use crate::diagnostics::{CityDiagnostic, PopulateReport, SkipReason};
use crate::fetch::{FetchError, GraphFetcher};
use crate::graph::{read_graphml_file, write_graphml, GraphError, StreetGraph};
use crate::identity::{IdentityKey, ARTIFACT_EXTENSION};

/// Progress callback for [`GraphCache::populate`]
///
/// Receives (current_count, total_count, city) before each city is processed.
pub type FetchProgress<'a> = dyn Fn(usize, usize, &IdentityKey) + 'a;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list cache directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("fetching {city} failed: {source}")]
    Fetch {
        city: IdentityKey,
        #[source]
        source: FetchError,
    },

    #[error("cannot read cached graph {path}: {source}")]
    Graph {
        path: PathBuf,
        #[source]
        source: GraphError,
    },

    #[error("cannot encode graph for {city}: {source}")]
    Encode {
        city: IdentityKey,
        #[source]
        source: GraphError,
    },
}

/// What [`GraphCache::ensure_cached`] did for one city
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// An artifact already existed; nothing was fetched
    AlreadyCached,
    /// The graph was fetched and written
    Cached,
    /// The city was left uncached without error
    Skipped(SkipReason),
}

/// A graph read back from the cache together with its identity
#[derive(Debug, Clone)]
pub struct CachedGraph {
    pub graph: StreetGraph,
    pub identity: IdentityKey,
    pub path: PathBuf,
}

/// Directory-backed graph cache
#[derive(Debug, Clone)]
pub struct GraphCache {
    dir: PathBuf,
}

impl GraphCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the cache directory if it does not exist
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })
    }

    /// Artifact path for an identity
    pub fn path_for(&self, key: &IdentityKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.path_for(key).exists()
    }

    /// Load one cached graph by identity
    pub fn load(&self, key: &IdentityKey) -> Result<StreetGraph, CacheError> {
        let path = self.path_for(key);
        read_graphml_file(&path).map_err(|source| CacheError::Graph { path, source })
    }

    /// Make sure a city's graph is cached, fetching it only if absent
    ///
    /// # Behavior
    /// - Existing artifact: no fetch, no validation, [`CacheOutcome::AlreadyCached`]
    /// - Identity that cannot round-trip through its file name:
    ///   [`SkipReason::UnencodableName`], nothing fetched
    /// - Resolution failure: no artifact, [`SkipReason::Unresolved`]
    /// - Transport or decoding failure: [`CacheError::Fetch`]
    pub fn ensure_cached<F>(&self, city: &CityRecord, fetcher: &F) -> Result<CacheOutcome, CacheError>
    where
        F: GraphFetcher + ?Sized,
    {
        let key = IdentityKey::from(city);

        if self.contains(&key) {
            tracing::debug!(city = %key, "already cached");
            return Ok(CacheOutcome::AlreadyCached);
        }

        if !key.is_encodable() {
            tracing::debug!(city = %key, "skipping: name cannot be encoded");
            return Ok(CacheOutcome::Skipped(SkipReason::UnencodableName));
        }

        let graph = match fetcher.resolve(&key.name, &key.country_code) {
            Ok(graph) => graph,
            Err(e) if e.is_resolution() => {
                tracing::debug!(city = %key, error = %e, "skipping: unresolved");
                return Ok(CacheOutcome::Skipped(SkipReason::Unresolved(e.to_string())));
            }
            Err(source) => return Err(CacheError::Fetch { city: key, source }),
        };

        if self.store(&key, &graph)? {
            tracing::debug!(
                city = %key,
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "cached graph"
            );
            Ok(CacheOutcome::Cached)
        } else {
            Ok(CacheOutcome::AlreadyCached)
        }
    }

    /// Write a graph under `key` atomically, creating the cache directory if needed
    ///
    /// Returns `false` if another writer created the artifact first; the
    /// existing file is left untouched.
    pub fn store(&self, key: &IdentityKey, graph: &StreetGraph) -> Result<bool, CacheError> {
        self.ensure_dir()?;
        let bytes = write_graphml(graph).map_err(|source| CacheError::Encode {
            city: key.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(&self.dir)
            .map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_err(e.error)),
        }
    }

    /// Populate the cache for a batch of cities, one at a time
    ///
    /// Resolution failures and transport failures are recorded in the
    /// report and the batch moves on. Cache I/O errors abort.
    pub fn populate<F>(
        &self,
        cities: &[&CityRecord],
        fetcher: &F,
        progress: Option<&FetchProgress<'_>>,
    ) -> Result<PopulateReport, CacheError>
    where
        F: GraphFetcher + ?Sized,
    {
        self.ensure_dir()?;
        let total = cities.len();
        let mut report = PopulateReport::default();

        for (idx, city) in cities.iter().enumerate() {
            let key = IdentityKey::from(*city);
            if let Some(cb) = progress {
                cb(idx + 1, total, &key);
            }

            match self.ensure_cached(city, fetcher) {
                Ok(CacheOutcome::Cached) => report.cached.push(key),
                Ok(CacheOutcome::AlreadyCached) => report.already_cached.push(key),
                Ok(CacheOutcome::Skipped(reason)) => {
                    report.diagnostics.push(CityDiagnostic::Skipped { city: key, reason })
                }
                Err(CacheError::Fetch { city, source }) => {
                    tracing::warn!(city = %city, error = %source, "fetch failed, continuing");
                    report.diagnostics.push(CityDiagnostic::Failed {
                        city,
                        message: source.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let report = report.finish();
        tracing::info!(
            requested = report.requested(),
            cached = report.cached.len(),
            already_cached = report.already_cached.len(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "cache population finished"
        );
        Ok(report)
    }

    /// Lazily iterate over every cached graph
    ///
    /// The directory is listed when this is called; graphs are read one at
    /// a time as the iterator advances. Calling it again re-scans. Order is
    /// whatever the filesystem returns.
    pub fn iterate_cached(&self) -> Result<CachedGraphs, CacheError> {
        let mut entries = Vec::new();
        let mut skipped = Vec::new();

        if !self.dir.exists() {
            return Ok(CachedGraphs {
                entries: entries.into_iter(),
                skipped,
            });
        }

        for entry in walkdir::WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION)
            {
                continue;
            }

            match IdentityKey::from_path(path) {
                Ok(identity) => entries.push((path.to_path_buf(), identity)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping undecodable cache file");
                    skipped.push(path.to_path_buf());
                }
            }
        }

        Ok(CachedGraphs {
            entries: entries.into_iter(),
            skipped,
        })
    }

    /// Number of decodable artifacts currently in the cache
    pub fn cached_count(&self) -> Result<usize, CacheError> {
        Ok(self.iterate_cached()?.len())
    }
}

/// Iterator over cached graphs, see [`GraphCache::iterate_cached`]
#[derive(Debug)]
pub struct CachedGraphs {
    entries: std::vec::IntoIter<(PathBuf, IdentityKey)>,
    skipped: Vec<PathBuf>,
}

impl CachedGraphs {
    /// Artifact files whose names did not decode into an identity
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }
}

impl Iterator for CachedGraphs {
    type Item = Result<CachedGraph, CacheError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (path, identity) = self.entries.next()?;
        Some(match read_graphml_file(&path) {
            Ok(graph) => Ok(CachedGraph {
                graph,
                identity,
                path,
            }),
            Err(source) => Err(CacheError::Graph { path, source }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for CachedGraphs {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StreetEdge;
    use std::cell::Cell;

    struct CountingFetcher {
        calls: Cell<usize>,
        fail_with: Option<fn(&str) -> FetchError>,
    }

    impl CountingFetcher {
        fn ok() -> Self {
            Self { calls: Cell::new(0), fail_with: None }
        }
    }

    impl GraphFetcher for CountingFetcher {
        fn resolve(&self, name: &str, _country_code: &str) -> Result<StreetGraph, FetchError> {
            self.calls.set(self.calls.get() + 1);
            if let Some(fail) = self.fail_with {
                return Err(fail(name));
            }
            let mut graph = StreetGraph::default();
            graph.add_node(1, 0.0, 0.0);
            graph.add_node(2, 0.001, 0.0);
            graph.add_edge(1, 2, StreetEdge { length: Some(111.0), ..Default::default() });
            Ok(graph)
        }
    }

    fn city(id: u64, name: &str) -> CityRecord {
        CityRecord {
            geoname_id: id,
            name: name.to_string(),
            country_code: "FR".to_string(),
            population: 100_000,
            location: None,
        }
    }

    #[test]
    fn test_store_leaves_no_temp_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path());
        let key = IdentityKey::new(1, "Lyon", "FR");

        assert!(cache.store(&key, &StreetGraph::default()).unwrap());
        assert!(!cache.store(&key, &StreetGraph::default()).unwrap(), "no clobber");

        let names: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1_Lyon_FR.graphml".to_string()]);
    }

    #[test]
    fn test_ensure_cached_skips_unencodable_name_without_fetching() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path());
        let fetcher = CountingFetcher::ok();

        let outcome = cache.ensure_cached(&city(5, "Saint_Malo"), &fetcher).unwrap();
        assert_eq!(outcome, CacheOutcome::Skipped(SkipReason::UnencodableName));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_transport_failure_is_an_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path());
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            fail_with: Some(|_| FetchError::Decode { service: "test", message: "garbage".into() }),
        };

        let err = cache.ensure_cached(&city(5, "Lyon"), &fetcher).unwrap_err();
        assert!(matches!(err, CacheError::Fetch { .. }));
        assert_eq!(cache.cached_count().unwrap(), 0);
    }

    #[test]
    fn test_populate_continues_past_failures() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path().join("graphs"));
        let failing = CountingFetcher {
            calls: Cell::new(0),
            fail_with: Some(|name| FetchError::NotFound(name.to_string())),
        };

        let a = city(1, "Atlantis");
        let b = city(2, "Lemuria");
        let report = cache.populate(&[&a, &b], &failing, None).unwrap();
        assert_eq!(failing.calls.get(), 2);
        assert_eq!(report.skipped_count(), 2);
        assert!(report.cached.is_empty());
        assert_eq!(cache.cached_count().unwrap(), 0);
    }

    #[test]
    fn test_populate_reports_progress() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path());
        let fetcher = CountingFetcher::ok();
        let seen = std::cell::RefCell::new(Vec::new());
        let progress = |current: usize, total: usize, key: &IdentityKey| {
            seen.borrow_mut().push((current, total, key.geoname_id));
        };

        let a = city(1, "Lyon");
        let b = city(2, "Nantes");
        let report = cache.populate(&[&a, &b], &fetcher, Some(&progress)).unwrap();

        assert_eq!(report.cached.len(), 2);
        assert_eq!(*seen.borrow(), vec![(1, 2, 1), (2, 2, 2)]);
    }

    #[test]
    fn test_iterate_missing_directory_is_empty() {
        let cache = GraphCache::new("/nonexistent/urbanform/cache");
        assert_eq!(cache.iterate_cached().unwrap().count(), 0);
    }

    #[test]
    fn test_load_by_identity() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cache = GraphCache::new(temp_dir.path());
        let fetcher = CountingFetcher::ok();
        cache.ensure_cached(&city(9, "Lille"), &fetcher).unwrap();

        let graph = cache.load(&IdentityKey::new(9, "Lille", "FR")).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert!(cache.load(&IdentityKey::new(10, "Lille", "FR")).is_err());
    }
}
