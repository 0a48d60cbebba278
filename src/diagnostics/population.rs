//! Skip reasons and the population report.
//!
//! Ordering is deterministic (by city, then failures before skips) so the
//! report prints the same way regardless of fetch order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::identity::IdentityKey;

/// Why a city was left out of the cache without an error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The identity would not survive the file-name round trip
    UnencodableName,
    /// The place could not be resolved to a street network
    Unresolved(String),
}

impl SkipReason {
    /// Stable sort key for deterministic ordering.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::UnencodableName => 0,
            SkipReason::Unresolved(_) => 1,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SkipReason::UnencodableName => "name contains a file-name separator".to_string(),
            SkipReason::Unresolved(message) => format!("unresolved: {}", message),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A per-city event worth reporting after a population run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CityDiagnostic {
    /// City was left uncached on purpose
    Skipped {
        city: IdentityKey,
        reason: SkipReason,
    },
    /// Fetching failed for a reason other than resolution (network, bad response)
    Failed { city: IdentityKey, message: String },
}

impl CityDiagnostic {
    pub fn city(&self) -> &IdentityKey {
        match self {
            CityDiagnostic::Skipped { city, .. } | CityDiagnostic::Failed { city, .. } => city,
        }
    }

    /// Primary: geoname id. Secondary: failures before skips.
    pub fn sort_key(&self) -> (u64, u8, u8) {
        match self {
            CityDiagnostic::Failed { city, .. } => (city.geoname_id, 0, 0),
            CityDiagnostic::Skipped { city, reason } => (city.geoname_id, 1, reason.sort_key()),
        }
    }

    /// Examples:
    /// - "SKIP 2988507 (Paris, FR): unresolved: no place found for 'Paris, FR'"
    /// - "FAIL 2988507 (Paris, FR): request failed: timeout"
    pub fn format_stderr(&self) -> String {
        match self {
            CityDiagnostic::Skipped { city, reason } => format!("SKIP {}: {}", city, reason),
            CityDiagnostic::Failed { city, message } => format!("FAIL {}: {}", city, message),
        }
    }
}

impl fmt::Display for CityDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_stderr())
    }
}

impl PartialOrd for CityDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CityDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Outcome of populating the cache for a batch of cities
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopulateReport {
    /// Cities fetched and written during this run
    pub cached: Vec<IdentityKey>,
    /// Cities whose artifact already existed
    pub already_cached: Vec<IdentityKey>,
    /// Skips and failures, sorted
    pub diagnostics: Vec<CityDiagnostic>,
}

impl PopulateReport {
    pub fn requested(&self) -> usize {
        self.cached.len() + self.already_cached.len() + self.diagnostics.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, CityDiagnostic::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, CityDiagnostic::Failed { .. }))
            .count()
    }

    /// Sort every list for stable output
    pub fn finish(mut self) -> Self {
        self.cached.sort();
        self.already_cached.sort();
        self.diagnostics.sort();
        self
    }
}
