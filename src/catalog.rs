//! City catalog loading and population filtering
//!
//! The catalog is a GeoJSON FeatureCollection as published by GeoNames
//! ("all cities with a population > 1000"). Each feature carries
//! `geoname_id`, `name`, `country_code` and `population` in its properties
//! and a Point geometry that is passed through untouched.

use geo::Point;
use serde::Deserialize;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Population band of the batch fetch step
pub const FETCH_POPULATION_RANGE: RangeInclusive<u64> = 100_000..=110_000;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path} is not a GeoJSON FeatureCollection: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("feature #{index} is invalid: {reason}")]
    InvalidFeature { index: usize, reason: String },

    #[error("geoname id {0} appears more than once in the catalog")]
    DuplicateGeonameId(u64),
}

/// One city row from the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CityRecord {
    pub geoname_id: u64,
    pub name: String,
    pub country_code: String,
    pub population: u64,
    pub location: Option<Point<f64>>,
}

#[derive(Deserialize)]
struct RawCollection {
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl RawFeature {
    fn into_record(self, index: usize) -> Result<CityRecord, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidFeature {
            index,
            reason: reason.to_string(),
        };

        let geoname_id = self
            .properties
            .get("geoname_id")
            .and_then(as_u64)
            .ok_or_else(|| invalid("missing or non-integer geoname_id"))?;

        let name = self
            .properties
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("missing name"))?
            .to_string();

        let country_code = self
            .properties
            .get("country_code")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        // GeoNames publishes a few rows with a null population
        let population = self
            .properties
            .get("population")
            .and_then(as_u64)
            .unwrap_or(0);

        let location = self.geometry.and_then(|g| match (g.kind.as_str(), g.coordinates.as_slice()) {
            ("Point", [lon, lat, ..]) => Some(Point::new(*lon, *lat)),
            _ => None,
        });

        Ok(CityRecord {
            geoname_id,
            name,
            country_code,
            population,
            location,
        })
    }
}

/// Accepts both `123` and `"123"`
fn as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// In-memory snapshot of the city catalog
#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    cities: Vec<CityRecord>,
}

impl CityCatalog {
    /// Load the full catalog from a GeoJSON file
    ///
    /// Fails if the file is missing, unreadable, not a FeatureCollection,
    /// or contains a duplicated `geoname_id`.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawCollection = serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let cities = raw
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| feature.into_record(index))
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Self::from_records(cities)?;
        tracing::info!(path = %path.display(), cities = catalog.len(), "loaded city catalog");
        Ok(catalog)
    }

    /// Build a catalog from already parsed records, enforcing id uniqueness
    pub fn from_records(cities: Vec<CityRecord>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(cities.len());
        for city in &cities {
            if !seen.insert(city.geoname_id) {
                return Err(CatalogError::DuplicateGeonameId(city.geoname_id));
            }
        }
        Ok(Self { cities })
    }

    pub fn cities(&self) -> &[CityRecord] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Cities with `from <= population <= to`
    ///
    /// Returns an empty list when `from > to`.
    pub fn filter_by_population(&self, from: u64, to: u64) -> Vec<&CityRecord> {
        self.cities
            .iter()
            .filter(|city| from <= city.population && city.population <= to)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn city(id: u64, population: u64) -> CityRecord {
        CityRecord {
            geoname_id: id,
            name: format!("City{}", id),
            country_code: "FR".to_string(),
            population,
            location: None,
        }
    }

    #[test]
    fn test_load_geojson_catalog() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("cities.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[2.35,48.85]},
                 "properties":{"geoname_id":"2988507","name":"Paris","country_code":"FR","population":2138551}},
                {"type":"Feature","geometry":null,
                 "properties":{"geoname_id":3117735,"name":"Madrid","country_code":"ES","population":null}}
            ]}"#,
        )
        .unwrap();

        let catalog = CityCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);

        let paris = &catalog.cities()[0];
        assert_eq!(paris.geoname_id, 2988507);
        assert_eq!(paris.population, 2138551);
        assert_eq!(paris.location, Some(Point::new(2.35, 48.85)));

        let madrid = &catalog.cities()[1];
        assert_eq!(madrid.population, 0);
        assert_eq!(madrid.location, None);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = CityCatalog::load(Path::new("/nonexistent/cities.geojson")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_load_rejects_feature_without_id() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("cities.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"properties":{"name":"Nowhere"}}]}"#,
        )
        .unwrap();

        let err = CityCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidFeature { index: 0, .. }));
    }

    #[test]
    fn test_duplicate_geoname_id_rejected() {
        let err = CityCatalog::from_records(vec![city(1, 10), city(1, 20)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateGeonameId(1)));
    }

    #[test]
    fn test_filter_bounds_are_inclusive() {
        let catalog =
            CityCatalog::from_records(vec![city(1, 99), city(2, 100), city(3, 150), city(4, 200), city(5, 201)])
                .unwrap();
        let ids: Vec<u64> = catalog
            .filter_by_population(100, 200)
            .iter()
            .map(|c| c.geoname_id)
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(catalog.filter_by_population(300, 100).is_empty());
    }

    proptest! {
        #[test]
        fn prop_filter_is_exact_subset(
            populations in proptest::collection::vec(0u64..2_000, 0..50),
            from in 0u64..2_000,
            to in 0u64..2_000,
        ) {
            let records: Vec<CityRecord> = populations
                .iter()
                .enumerate()
                .map(|(i, p)| city(i as u64, *p))
                .collect();
            let catalog = CityCatalog::from_records(records).unwrap();
            let filtered = catalog.filter_by_population(from, to);

            let expected = catalog
                .cities()
                .iter()
                .filter(|c| from <= c.population && c.population <= to)
                .count();
            prop_assert_eq!(filtered.len(), expected);
            for c in filtered {
                prop_assert!(from <= c.population && c.population <= to);
                prop_assert!(catalog.cities().contains(c));
            }
        }
    }
}
