//! Pipeline configuration
//!
//! Every location the pipeline touches is an explicit value handed to the
//! component that needs it. Nothing is created at load time: the graph
//! cache and the table writer create their own directories on first write.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name of the GeoNames city catalog inside the data directory
pub const CATALOG_FILE_NAME: &str = "geonames-all-cities-with-a-population-1000.geojson";

/// Subdirectory holding one GraphML file per city
pub const CACHE_DIR_NAME: &str = "cities_graphs";

/// Subdirectory holding the aggregated table
pub const PROCESSED_DIR_NAME: &str = "processed";

/// File name of the aggregated table
pub const TABLE_FILE_NAME: &str = "stats.csv";

/// Filesystem layout of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub catalog_path: PathBuf,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    /// Standard layout rooted at `data_dir`
    pub fn from_data_dir(data_dir: &Path) -> Self {
        Self {
            catalog_path: data_dir.join(CATALOG_FILE_NAME),
            cache_dir: data_dir.join(CACHE_DIR_NAME),
            output_dir: data_dir.join(PROCESSED_DIR_NAME),
        }
    }

    /// Path of the persisted metrics table
    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(TABLE_FILE_NAME)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_data_dir(Path::new("data"))
    }
}

/// Endpoints and politeness settings for the Nominatim/Overpass fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub nominatim_url: String,
    pub overpass_url: String,
    /// Nominatim's usage policy requires an identifying User-Agent
    pub user_agent: String,
    pub timeout: Duration,
    /// Pause before every request
    pub request_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org/search".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            user_agent: format!("urbanform/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(180),
            request_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_data_dir() {
        let config = PipelineConfig::from_data_dir(Path::new("/srv/data"));
        assert_eq!(
            config.catalog_path,
            PathBuf::from("/srv/data/geonames-all-cities-with-a-population-1000.geojson")
        );
        assert_eq!(config.cache_dir, PathBuf::from("/srv/data/cities_graphs"));
        assert_eq!(config.table_path(), PathBuf::from("/srv/data/processed/stats.csv"));
    }
}
