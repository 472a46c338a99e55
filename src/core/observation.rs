//! Observation rows and dataset loading
//!
//! Row order is the only row identity: the position of an observation in
//! [`ObservationTable`] is its `row_index` for the whole run.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use std::path::Path;

use super::config::ColumnConfig;
use super::error::{CategorizeError, CategorizeResult};

/// ISO-8601 layout used for every date written by the pipeline.
///
/// `%.f` prints nothing for whole seconds and keeps sub-second precision otherwise.
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// A parsed date cell: wall-clock time plus the UTC offset when the input had one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    local: NaiveDateTime,
    offset: Option<FixedOffset>,
}

impl Timestamp {
    pub fn naive(local: NaiveDateTime) -> Self {
        Self {
            local,
            offset: None,
        }
    }

    pub fn with_offset(dt: DateTime<FixedOffset>) -> Self {
        Self {
            local: dt.naive_local(),
            offset: Some(*dt.offset()),
        }
    }

    /// Wall-clock time as written in the data; drives calendar buckets
    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Point in time for differences; offset-less values are taken as UTC
    pub fn instant(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => self.local - offset,
            None => self.local,
        }
    }
}

/// Parse a date or datetime cell. Unparseable or blank input yields `None`.
pub fn parse_datetime(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Timestamp::with_offset(dt));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Timestamp::naive(dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return d.and_hms_opt(0, 0, 0).map(Timestamp::naive);
        }
    }

    None
}

/// ISO rendering of the wall-clock time, with `+HH:MM` when an offset is known
pub fn format_iso(ts: &Timestamp) -> String {
    let local = ts.local.format(ISO_FORMAT);
    match ts.offset {
        Some(offset) => format!("{}{}", local, offset),
        None => local.to_string(),
    }
}

/// A single input row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub title: Option<String>,
    pub body: Option<String>,
    pub observation_date: Option<Timestamp>,
    pub processed_date: Option<Timestamp>,
}

impl Observation {
    /// Title and body joined by a space and trimmed; missing parts are empty
    pub fn text_for_embedding(&self) -> String {
        format!(
            "{} {}",
            self.title.as_deref().unwrap_or(""),
            self.body.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    }
}

/// Raw tabular input as read from disk, all cells kept as text
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header row: {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record =
                record.with_context(|| format!("Failed to read row from: {}", path.display()))?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Ordered observations for one run
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    observations: Vec<Observation>,
}

impl ObservationTable {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Build observations from a raw table without touching it.
    ///
    /// Fails with [`CategorizeError::Configuration`] when a configured
    /// column is missing.
    pub fn from_raw(table: &RawTable, columns: &ColumnConfig) -> CategorizeResult<Self> {
        let mut indices = [0usize; 4];
        for (slot, name) in indices.iter_mut().zip(columns.required()) {
            *slot = table
                .column_index(name)
                .ok_or_else(|| CategorizeError::missing_column(name, &table.headers))?;
        }
        let [title, body, obs_date, proc_date] = indices;

        let observations = (0..table.rows.len())
            .map(|i| Observation {
                title: table.cell(i, title).map(String::from),
                body: table.cell(i, body).map(String::from),
                observation_date: table.cell(i, obs_date).and_then(parse_datetime),
                processed_date: table.cell(i, proc_date).and_then(parse_datetime),
            })
            .collect();

        Ok(Self { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    pub fn texts_for_embedding(&self) -> Vec<String> {
        self.observations
            .iter()
            .map(Observation::text_for_embedding)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_text_for_embedding() {
        let obs = Observation {
            title: Some("  Slippery floor".to_string()),
            body: None,
            ..Default::default()
        };
        assert_eq!(obs.text_for_embedding(), "Slippery floor");

        let empty = Observation::default();
        assert_eq!(empty.text_for_embedding(), "");
    }

    #[test]
    fn test_parse_datetime_variants() {
        let d = parse_datetime("2024-01-03").unwrap();
        assert_eq!(format_iso(&d), "2024-01-03T00:00:00");

        let dt = parse_datetime("2024-01-03 14:30:00").unwrap();
        assert_eq!(format_iso(&dt), "2024-01-03T14:30:00");

        let rfc = parse_datetime("2024-01-03T14:30:00Z").unwrap();
        assert_eq!(format_iso(&rfc), "2024-01-03T14:30:00+00:00");

        let frac = parse_datetime("2024-01-03T14:30:00.250").unwrap();
        assert_eq!(format_iso(&frac), "2024-01-03T14:30:00.250");

        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("   ").is_none());
    }

    #[test]
    fn test_offset_keeps_wall_clock() {
        let ts = parse_datetime("2024-12-31T23:00:00-05:00").unwrap();
        assert_eq!(ts.local().year(), 2024);
        assert_eq!(ts.local().month(), 12);
        assert_eq!(
            ts.instant(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(4, 0, 0).unwrap()
        );
        assert_eq!(format_iso(&ts), "2024-12-31T23:00:00-05:00");
        assert_eq!(parse_datetime(&format_iso(&ts)), Some(ts));
    }

    #[test]
    fn test_from_raw_preserves_order_and_source() {
        let table = raw(
            &["Title", "Observation", "Observation_date", "Processed_date"],
            &[
                &["A", "first", "2024-01-01", "2024-01-03"],
                &["", "second", "garbage", ""],
            ],
        );
        let obs = ObservationTable::from_raw(&table, &ColumnConfig::default()).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs.texts_for_embedding(), vec!["A first", "second"]);
        assert!(obs.get(1).unwrap().observation_date.is_none());
        assert!(obs.get(1).unwrap().processed_date.is_none());
        // source table untouched
        assert_eq!(table.rows[1][0], "");
    }

    #[test]
    fn test_from_raw_missing_column() {
        let table = raw(&["Title", "Observation_date", "Processed_date"], &[]);
        let err = ObservationTable::from_raw(&table, &ColumnConfig::default()).unwrap_err();
        match err {
            CategorizeError::Configuration { column, .. } => assert_eq!(column, "Observation"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_csv_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(
            &path,
            "Title,Observation,Observation_date,Processed_date\nWet floor,\"near the door, lobby\",2024-02-01,2024-02-05\n",
        )
        .unwrap();

        let table = RawTable::from_csv_path(&path).unwrap();
        let obs = ObservationTable::from_raw(&table, &ColumnConfig::default()).unwrap();
        assert_eq!(obs.texts_for_embedding(), vec!["Wet floor near the door, lobby"]);
    }
}
