//! City identity keys and the cache file naming scheme
//!
//! A cached graph lives at `{geoname_id}_{name}_{country_code}.graphml`.
//! Decoding splits the file stem on [`SEPARATOR`] into exactly three fields,
//! so the round trip only holds when `name` and `country_code` are free of
//! the separator. Such keys are reported by [`IdentityKey::is_encodable`]
//! and refused by the cache before any fetch happens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::catalog::CityRecord;

/// Field separator inside artifact file names
pub const SEPARATOR: char = '_';

/// Extension of cached graph artifacts (without the dot)
pub const ARTIFACT_EXTENSION: &str = "graphml";

/// Error decoding an artifact file name back into an [`IdentityKey`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("file name has no UTF-8 stem: {0}")]
    NoStem(String),

    #[error("expected 3 '{SEPARATOR}'-separated fields, found {found}: {stem}")]
    FieldCount { stem: String, found: usize },

    #[error("geoname id is not an unsigned integer: {0}")]
    InvalidGeonameId(String),
}

/// The triple naming one city's cached artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub geoname_id: u64,
    pub name: String,
    pub country_code: String,
}

impl IdentityKey {
    pub fn new(geoname_id: u64, name: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            geoname_id,
            name: name.into(),
            country_code: country_code.into(),
        }
    }

    /// File stem: `{geoname_id}_{name}_{country_code}`
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.geoname_id,
            self.name,
            self.country_code,
            sep = SEPARATOR
        )
    }

    /// Full artifact file name including the extension
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.encode(), ARTIFACT_EXTENSION)
    }

    /// Decode a file stem produced by [`IdentityKey::encode`]
    pub fn decode(stem: &str) -> Result<Self, IdentityError> {
        let fields: Vec<&str> = stem.split(SEPARATOR).collect();
        if fields.len() != 3 {
            return Err(IdentityError::FieldCount {
                stem: stem.to_string(),
                found: fields.len(),
            });
        }

        let geoname_id = fields[0]
            .parse::<u64>()
            .map_err(|_| IdentityError::InvalidGeonameId(fields[0].to_string()))?;

        Ok(Self::new(geoname_id, fields[1], fields[2]))
    }

    /// Decode the identity from an artifact path (extension is ignored)
    pub fn from_path(path: &Path) -> Result<Self, IdentityError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| IdentityError::NoStem(path.display().to_string()))?;
        Self::decode(stem)
    }

    /// Whether `decode(encode(self)) == self` holds and the name is a plain file name
    pub fn is_encodable(&self) -> bool {
        let clean = |field: &str| {
            !field.contains(SEPARATOR) && !field.contains('/') && !field.contains('\\')
        };
        clean(&self.name) && clean(&self.country_code)
    }
}

impl From<&CityRecord> for IdentityKey {
    fn from(city: &CityRecord) -> Self {
        Self::new(city.geoname_id, city.name.clone(), city.country_code.clone())
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.geoname_id, self.name, self.country_code)
    }
}
