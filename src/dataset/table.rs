//! The aggregated metrics table and its CSV layout
//!
//! Column order:
//! `geoname_id, name, country_code`, the scalar stats in [`STAT_COLUMNS`]
//! order, `area`, then `{k}_way_int_count` for every observed k ascending,
//! then `{k}_way_int_prop` ascending. `None` values and histogram entries a
//! city does not have are empty cells. Floats are written with the shortest
//! representation that parses back to the same value, so reading a table
//! back gives exactly what was written.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Write};

use super::DatasetError;
use crate::identity::IdentityKey;
use crate::metrics::{BasicStats, IntersectionShare, MetricsRecord};

/// Identity columns, first in every row
pub const IDENTITY_COLUMNS: [&str; 3] = ["geoname_id", "name", "country_code"];

/// Scalar stat columns, in output order
pub const STAT_COLUMNS: [&str; 16] = [
    "n",
    "m",
    "k_avg",
    "edge_length_total",
    "edge_length_avg",
    "streets_per_node_avg",
    "intersection_count",
    "street_length_total",
    "street_segment_count",
    "street_length_avg",
    "circuity_avg",
    "self_loop_proportion",
    "node_density_km",
    "intersection_density_km",
    "edge_density_km",
    "street_density_km",
];

pub const AREA_COLUMN: &str = "area";

const COUNT_SUFFIX: &str = "_way_int_count";
const PROP_SUFFIX: &str = "_way_int_prop";

pub fn count_column(k: u32) -> String {
    format!("{k}{COUNT_SUFFIX}")
}

pub fn prop_column(k: u32) -> String {
    format!("{k}{PROP_SUFFIX}")
}

/// Per-city metrics keyed by geoname id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsTable {
    records: BTreeMap<u64, MetricsRecord>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, geoname_id: u64) -> Option<&MetricsRecord> {
        self.records.get(&geoname_id)
    }

    /// Records ordered by geoname id
    pub fn iter(&self) -> impl Iterator<Item = &MetricsRecord> + '_ {
        self.records.values()
    }

    /// Add a record; a second record for the same geoname id is an error
    pub fn insert(&mut self, record: MetricsRecord) -> Result<(), DatasetError> {
        if let Some(existing) = self.records.get(&record.geoname_id()) {
            return Err(DatasetError::DuplicateGeonameId {
                first: existing.identity.clone(),
                second: record.identity,
            });
        }
        self.records.insert(record.geoname_id(), record);
        Ok(())
    }

    /// Every k observed in any record, ascending
    pub fn degrees(&self) -> BTreeSet<u32> {
        self.records
            .values()
            .flat_map(|r| r.intersections.keys().copied())
            .collect()
    }

    /// Header row of the persisted table
    pub fn column_names(&self) -> Vec<String> {
        let degrees = self.degrees();
        IDENTITY_COLUMNS
            .iter()
            .chain(STAT_COLUMNS.iter())
            .chain(std::iter::once(&AREA_COLUMN))
            .map(|c| c.to_string())
            .chain(degrees.iter().map(|&k| count_column(k)))
            .chain(degrees.iter().map(|&k| prop_column(k)))
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DatasetError> {
        let degrees = self.degrees();
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.column_names())?;

        for record in self.records.values() {
            let mut row = vec![
                record.identity.geoname_id.to_string(),
                record.identity.name.clone(),
                record.identity.country_code.clone(),
            ];
            row.extend(stat_cells(&record.stats));
            row.push(record.area.to_string());
            for k in &degrees {
                row.push(
                    record
                        .intersections
                        .get(k)
                        .map(|s| s.count.to_string())
                        .unwrap_or_default(),
                );
            }
            for k in &degrees {
                row.push(
                    record
                        .intersections
                        .get(k)
                        .map(|s| s.proportion.to_string())
                        .unwrap_or_default(),
                );
            }
            wtr.write_record(&row)?;
        }

        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn read_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let layout = Layout::from_headers(rdr.headers()?)?;

        let mut table = MetricsTable::new();
        for result in rdr.records() {
            let row = result?;
            let line = row.position().map_or(0, |p| p.line());
            table.insert(layout.parse_row(&row, line)?)?;
        }
        Ok(table)
    }
}

impl<'a> IntoIterator for &'a MetricsTable {
    type Item = &'a MetricsRecord;
    type IntoIter = std::collections::btree_map::Values<'a, u64, MetricsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

fn stat_cells(s: &BasicStats) -> [String; 16] {
    fn opt(v: Option<f64>) -> String {
        v.map(|v| v.to_string()).unwrap_or_default()
    }
    [
        s.n.to_string(),
        s.m.to_string(),
        s.k_avg.to_string(),
        s.edge_length_total.to_string(),
        s.edge_length_avg.to_string(),
        s.streets_per_node_avg.to_string(),
        s.intersection_count.to_string(),
        s.street_length_total.to_string(),
        s.street_segment_count.to_string(),
        s.street_length_avg.to_string(),
        opt(s.circuity_avg),
        s.self_loop_proportion.to_string(),
        opt(s.node_density_km),
        opt(s.intersection_density_km),
        opt(s.edge_density_km),
        opt(s.street_density_km),
    ]
}

/// Column positions resolved from a header row
struct Layout {
    positions: HashMap<String, usize>,
    degrees: BTreeSet<u32>,
}

enum ColumnKind {
    Fixed,
    Count(u32),
    Prop(u32),
}

fn classify(column: &str) -> Option<ColumnKind> {
    if IDENTITY_COLUMNS.contains(&column) || STAT_COLUMNS.contains(&column) || column == AREA_COLUMN
    {
        return Some(ColumnKind::Fixed);
    }
    if let Some(k) = column.strip_suffix(COUNT_SUFFIX) {
        return k.parse().ok().map(ColumnKind::Count);
    }
    if let Some(k) = column.strip_suffix(PROP_SUFFIX) {
        return k.parse().ok().map(ColumnKind::Prop);
    }
    None
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, DatasetError> {
        let mut positions = HashMap::new();
        let mut degrees = BTreeSet::new();

        for (idx, column) in headers.iter().enumerate() {
            match classify(column) {
                Some(ColumnKind::Fixed) => {}
                Some(ColumnKind::Count(k)) | Some(ColumnKind::Prop(k)) => {
                    degrees.insert(k);
                }
                None => return Err(DatasetError::UnknownColumn(column.to_string())),
            }
            if positions.insert(column.to_string(), idx).is_some() {
                return Err(DatasetError::DuplicateColumn(column.to_string()));
            }
        }

        let required = IDENTITY_COLUMNS
            .iter()
            .chain(STAT_COLUMNS.iter())
            .chain(std::iter::once(&AREA_COLUMN));
        for column in required {
            if !positions.contains_key(*column) {
                return Err(DatasetError::MissingColumn(column.to_string()));
            }
        }

        Ok(Self { positions, degrees })
    }

    fn parse_row(&self, row: &csv::StringRecord, line: u64) -> Result<MetricsRecord, DatasetError> {
        let cells = Cells {
            layout: self,
            row,
            line,
        };

        let identity = IdentityKey::new(
            cells.required::<u64>("geoname_id")?,
            cells.get("name"),
            cells.get("country_code"),
        );

        let stats = BasicStats {
            n: cells.required("n")?,
            m: cells.required("m")?,
            k_avg: cells.required("k_avg")?,
            edge_length_total: cells.required("edge_length_total")?,
            edge_length_avg: cells.required("edge_length_avg")?,
            streets_per_node_avg: cells.required("streets_per_node_avg")?,
            intersection_count: cells.required("intersection_count")?,
            street_length_total: cells.required("street_length_total")?,
            street_segment_count: cells.required("street_segment_count")?,
            street_length_avg: cells.required("street_length_avg")?,
            circuity_avg: cells.optional("circuity_avg")?,
            self_loop_proportion: cells.required("self_loop_proportion")?,
            node_density_km: cells.optional("node_density_km")?,
            intersection_density_km: cells.optional("intersection_density_km")?,
            edge_density_km: cells.optional("edge_density_km")?,
            street_density_km: cells.optional("street_density_km")?,
        };

        let mut intersections = BTreeMap::new();
        for &k in &self.degrees {
            let count_col = count_column(k);
            let prop_col = prop_column(k);
            let count: Option<u64> = cells.optional(&count_col)?;
            let proportion: Option<f64> = cells.optional(&prop_col)?;
            match (count, proportion) {
                (Some(count), Some(proportion)) => {
                    intersections.insert(k, IntersectionShare { count, proportion });
                }
                (None, None) => {}
                (Some(_), None) => return Err(cells.invalid(&prop_col, "")),
                (None, Some(_)) => return Err(cells.invalid(&count_col, "")),
            }
        }

        Ok(MetricsRecord {
            identity,
            stats,
            intersections,
            area: cells.required(AREA_COLUMN)?,
        })
    }
}

/// One row viewed through a [`Layout`]
struct Cells<'a> {
    layout: &'a Layout,
    row: &'a csv::StringRecord,
    line: u64,
}

impl Cells<'_> {
    fn invalid(&self, column: &str, value: &str) -> DatasetError {
        DatasetError::InvalidCell {
            line: self.line,
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Cell text; a column absent from the header reads as empty
    fn get(&self, column: &str) -> &str {
        self.layout
            .positions
            .get(column)
            .and_then(|&idx| self.row.get(idx))
            .unwrap_or("")
    }

    fn optional<T: std::str::FromStr>(&self, column: &str) -> Result<Option<T>, DatasetError> {
        let value = self.get(column);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|_| self.invalid(column, value))
    }

    fn required<T: std::str::FromStr>(&self, column: &str) -> Result<T, DatasetError> {
        self.optional(column)?
            .ok_or_else(|| self.invalid(column, ""))
    }
}
