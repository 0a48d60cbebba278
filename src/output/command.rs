//! Machine-readable command output
//!
//! Every JSON document printed by the binary is a [`JsonResponse`] envelope
//! around one of the command response types below. The envelope carries a
//! schema version so consumers can detect layout changes, and an execution
//! id tying the document to the stderr log of the same run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::catalog::CityRecord;
use crate::diagnostics::{CityDiagnostic, PopulateReport};

/// Bumped whenever a response field is renamed or removed
pub const URBANFORM_JSON_SCHEMA_VERSION: &str = "1.0.0";

const TOOL_NAME: &str = "urbanform";

/// Envelope around every JSON document on stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    pub schema_version: String,
    /// Same id as the run's log lines
    pub execution_id: String,
    pub tool: String,
    /// RFC 3339, second precision, UTC
    pub timestamp: String,
    pub data: T,
    /// Set when `data` is a truncated listing (e.g. cut by --limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

impl<T> JsonResponse<T> {
    pub fn new(data: T, execution_id: impl Into<String>) -> Self {
        Self {
            schema_version: URBANFORM_JSON_SCHEMA_VERSION.into(),
            execution_id: execution_id.into(),
            tool: TOOL_NAME.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            data,
            partial: None,
        }
    }

    /// Only records truncation; a complete listing keeps the field absent
    pub fn with_partial(self, truncated: bool) -> Self {
        Self {
            partial: truncated.then_some(true),
            ..self
        }
    }
}

/// One catalog city as listed by `cities`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CityEntry {
    pub geoname_id: u64,
    pub name: String,
    pub country_code: String,
    pub population: u64,
}

impl From<&CityRecord> for CityEntry {
    fn from(city: &CityRecord) -> Self {
        CityEntry {
            geoname_id: city.geoname_id,
            name: city.name.clone(),
            country_code: city.country_code.clone(),
            population: city.population,
        }
    }
}

/// Response for the cities command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitiesResponse {
    /// Lower population bound (inclusive)
    pub from: u64,
    /// Upper population bound (inclusive)
    pub to: u64,
    /// Number of cities in the band, before --limit
    pub total: usize,
    pub cities: Vec<CityEntry>,
}

/// Response for the fetch command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub requested: usize,
    pub cached: usize,
    pub already_cached: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Per-city skips and failures, ordered by geoname id
    pub diagnostics: Vec<CityDiagnostic>,
}

impl From<&PopulateReport> for FetchResponse {
    fn from(report: &PopulateReport) -> Self {
        FetchResponse {
            requested: report.requested(),
            cached: report.cached.len(),
            already_cached: report.already_cached.len(),
            skipped: report.skipped_count(),
            failed: report.failed_count(),
            diagnostics: report.diagnostics.clone(),
        }
    }
}

/// Response for the compute command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeResponse {
    /// Rows written to the table
    pub cities: usize,
    /// Streets-per-node values present as columns
    pub degrees: Vec<u32>,
    /// Cache files ignored because their names did not decode
    pub skipped_files: Vec<String>,
    pub table_path: String,
}

/// Response for the status command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub catalog_path: String,
    pub catalog_present: bool,
    pub cache_dir: String,
    /// Decodable graph artifacts in the cache
    pub cached_graphs: usize,
    /// Graph artifacts whose names did not decode
    pub undecodable_files: usize,
    pub table_path: String,
    /// Row count of the persisted table, if there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<usize>,
}

/// Body printed instead of command data when a command fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable code, see [`crate::error_codes`]
    pub error: String,
    pub message: String,
}

/// How a command prints its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("json") {
            Ok(OutputFormat::Json)
        } else if raw.eq_ignore_ascii_case("human") || raw.eq_ignore_ascii_case("text") {
            Ok(OutputFormat::Human)
        } else {
            Err(format!("Invalid output format: {} (expected human or json)", raw))
        }
    }
}

/// `{unix seconds hex}-{pid hex}`
pub fn generate_execution_id() -> String {
    let secs = chrono::Utc::now().timestamp().max(0) as u64;
    format!("{:x}-{:x}", secs, std::process::id())
}

/// Pretty-print a response to stdout
pub fn output_json<T: Serialize>(response: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(response)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::SkipReason;
    use crate::identity::IdentityKey;

    #[test]
    fn test_execution_id_is_two_hex_fields() {
        let id = generate_execution_id();
        let (secs, pid) = id.split_once('-').unwrap();
        assert!(u64::from_str_radix(secs, 16).is_ok(), "bad id: {id}");
        assert_eq!(u32::from_str_radix(pid, 16).unwrap(), std::process::id());
    }

    #[test]
    fn test_envelope_fields() {
        let response = JsonResponse::new(
            ComputeResponse {
                cities: 2,
                degrees: vec![1, 3],
                skipped_files: vec![],
                table_path: "data/processed/stats.csv".to_string(),
            },
            "5f00-1a",
        );

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["schema_version"], URBANFORM_JSON_SCHEMA_VERSION);
        assert_eq!(value["execution_id"], "5f00-1a");
        assert_eq!(value["tool"], "urbanform");
        assert_eq!(value["data"]["degrees"], serde_json::json!([1, 3]));
        assert!(value.get("partial").is_none());
    }

    #[test]
    fn test_partial_only_when_truncated() {
        let full = JsonResponse::new((), "x").with_partial(false);
        assert_eq!(full.partial, None);
        let cut = JsonResponse::new((), "x").with_partial(true);
        assert_eq!(cut.partial, Some(true));
    }

    #[test]
    fn test_fetch_response_from_report() {
        let report = PopulateReport {
            cached: vec![IdentityKey::new(1, "Lyon", "FR")],
            already_cached: vec![],
            diagnostics: vec![CityDiagnostic::Skipped {
                city: IdentityKey::new(2, "Atlantis", "GR"),
                reason: SkipReason::Unresolved("no place found".into()),
            }],
        };
        let response = FetchResponse::from(&report);
        assert_eq!(response.requested, 2);
        assert_eq!(response.skipped, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["diagnostics"][0]["status"], "skipped");
        assert_eq!(json["diagnostics"][0]["city"]["name"], "Atlantis");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("Json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("text".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("yaml".parse::<OutputFormat>().unwrap_err().contains("yaml"));
    }
}
