//! Place resolution into street networks
//!
//! A [`GraphFetcher`] turns a place name and country code into a drivable
//! street graph. Failing to resolve a place is routine for real-world names
//! and is reported as a resolution error, distinct from transport failures.

pub mod overpass;

use crate::graph::StreetGraph;

pub use overpass::{build_drive_graph, OverpassElement, OverpassFetcher};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Geocoder returned no result for the query
    #[error("no place found for '{0}'")]
    NotFound(String),

    /// Geocoder results were points, not areas a network can be cut from
    #[error("'{0}' did not resolve to an area")]
    NotAPolygon(String),

    /// The area resolved but holds no drivable streets
    #[error("no drivable network inside '{0}'")]
    EmptyNetwork(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl FetchError {
    /// Whether the place itself could not be resolved (as opposed to the service failing)
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound(_) | FetchError::NotAPolygon(_) | FetchError::EmptyNetwork(_)
        )
    }
}

/// Resolves a place into its street network
pub trait GraphFetcher {
    fn resolve(&self, name: &str, country_code: &str) -> Result<StreetGraph, FetchError>;
}

impl<F: GraphFetcher + ?Sized> GraphFetcher for &F {
    fn resolve(&self, name: &str, country_code: &str) -> Result<StreetGraph, FetchError> {
        (**self).resolve(name, country_code)
    }
}

/// Query string sent to the geocoder for a city
pub fn place_query(name: &str, country_code: &str) -> String {
    format!("{}, {}", name, country_code)
}
