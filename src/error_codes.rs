//! Stable error codes for JSON error responses
//!
//! Error codes follow the pattern: URB-{CATEGORY}-{3-digit number}
//!
//! Categories (1-3 uppercase letters):
//! - CAT: City catalog errors
//! - FET: Fetcher setup and transport errors
//! - CAC: Graph cache errors
//! - DS: Metrics table errors
//! - CLI: Invalid command line
//! - GEN: Anything else
//!
//! Each error code is stable and should not be reused.

use crate::cache::CacheError;
use crate::catalog::CatalogError;
use crate::dataset::DatasetError;
use crate::fetch::FetchError;

/// Catalog file missing or unreadable
pub const URB_CAT_001_CATALOG_UNREADABLE: &str = "URB-CAT-001";

/// Catalog is not a valid GeoJSON city collection
pub const URB_CAT_002_CATALOG_MALFORMED: &str = "URB-CAT-002";

/// Catalog lists the same geoname id twice
pub const URB_CAT_003_DUPLICATE_CITY: &str = "URB-CAT-003";

/// Fetcher could not be set up or the service failed
pub const URB_FET_001_FETCH_FAILED: &str = "URB-FET-001";

/// Cache directory could not be read or written
pub const URB_CAC_001_CACHE_IO: &str = "URB-CAC-001";

/// A cached graph could not be read or written as GraphML
pub const URB_CAC_002_GRAPH_UNREADABLE: &str = "URB-CAC-002";

/// Two cached graphs share a geoname id
pub const URB_DS_001_DUPLICATE_CITY: &str = "URB-DS-001";

/// Persisted table does not match the expected layout
pub const URB_DS_002_TABLE_MALFORMED: &str = "URB-DS-002";

/// Persisted table could not be read or written
pub const URB_DS_003_TABLE_IO: &str = "URB-DS-003";

/// Invalid command line
pub const URB_CLI_001_INVALID_ARGS: &str = "URB-CLI-001";

/// Uncategorised failure
pub const URB_GEN_001_INTERNAL: &str = "URB-GEN-001";

/// Error code for a command failure
///
/// Looks through the error chain for the first library error it knows.
pub fn code_for(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CatalogError>() {
            return match e {
                CatalogError::Io { .. } => URB_CAT_001_CATALOG_UNREADABLE,
                CatalogError::DuplicateGeonameId(_) => URB_CAT_003_DUPLICATE_CITY,
                _ => URB_CAT_002_CATALOG_MALFORMED,
            };
        }
        if cause.downcast_ref::<FetchError>().is_some() {
            return URB_FET_001_FETCH_FAILED;
        }
        if let Some(e) = cause.downcast_ref::<CacheError>() {
            return cache_code(e);
        }
        if let Some(e) = cause.downcast_ref::<DatasetError>() {
            return match e {
                DatasetError::Io { .. } => URB_DS_003_TABLE_IO,
                DatasetError::Cache(e) => cache_code(e),
                DatasetError::DuplicateGeonameId { .. } => URB_DS_001_DUPLICATE_CITY,
                _ => URB_DS_002_TABLE_MALFORMED,
            };
        }
    }
    URB_GEN_001_INTERNAL
}

fn cache_code(err: &CacheError) -> &'static str {
    match err {
        CacheError::Io { .. } | CacheError::Walk(_) => URB_CAC_001_CACHE_IO,
        CacheError::Fetch { .. } => URB_FET_001_FETCH_FAILED,
        CacheError::Graph { .. } | CacheError::Encode { .. } => URB_CAC_002_GRAPH_UNREADABLE,
    }
}
