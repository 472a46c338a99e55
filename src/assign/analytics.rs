//! Wide analytics table
//!
//! One row per assignment record, one column per dimension type seen in any
//! record, plus processing time and calendar buckets derived from the dates.

use chrono::Datelike;
use serde::Serialize;
use tracing::warn;

use super::assignment::AssignmentRecord;
use crate::core::error::OmitReason;
use crate::core::observation::{format_iso, parse_datetime, Timestamp};

pub const ROW_ID_COLUMN: &str = "row_id";
pub const OBSERVATION_DATE_COLUMN: &str = "observation_date";
pub const PROCESSED_DATE_COLUMN: &str = "processed_date";
pub const PROCESSING_TIME_COLUMN: &str = "processing_time_days";
pub const EVENT_YEAR_COLUMN: &str = "event_year";
pub const EVENT_MONTH_COLUMN: &str = "event_month";

/// Fixed columns a dimension column may not shadow
pub const RESERVED_COLUMNS: [&str; 6] = [
    ROW_ID_COLUMN,
    OBSERVATION_DATE_COLUMN,
    PROCESSED_DATE_COLUMN,
    PROCESSING_TIME_COLUMN,
    EVENT_YEAR_COLUMN,
    EVENT_MONTH_COLUMN,
];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single typed cell, `Null` standing in for missing values
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl CellValue {
    fn text(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Plain-text rendering; `Null` renders empty
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Real(f) => f.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRow {
    pub row_id: Option<usize>,
    pub observation_date: Option<Timestamp>,
    pub processed_date: Option<Timestamp>,
    /// Category per dimension column, aligned with [`AnalyticsTable::dimension_columns`]
    pub categories: Vec<Option<String>>,
    pub processing_time_days: Option<f64>,
    pub event_year: Option<i32>,
    pub event_month: Option<u32>,
}

/// A dimension left out of the table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDimension {
    pub dimension_type: String,
    pub reason: OmitReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsTable {
    include_row_id: bool,
    dimension_columns: Vec<String>,
    rows: Vec<AnalyticsRow>,
    skipped: Vec<SkippedDimension>,
}

impl AnalyticsTable {
    /// Lower-cased dimension columns in first-seen order
    pub fn dimension_columns(&self) -> &[String] {
        &self.dimension_columns
    }

    pub fn rows(&self) -> &[AnalyticsRow] {
        &self.rows
    }

    /// Dimensions whose column would collide with a fixed column
    pub fn skipped_dimensions(&self) -> &[SkippedDimension] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every column name, in output order
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.dimension_columns.len() + 6);
        if self.include_row_id {
            headers.push(ROW_ID_COLUMN.to_string());
        }
        headers.push(OBSERVATION_DATE_COLUMN.to_string());
        headers.push(PROCESSED_DATE_COLUMN.to_string());
        headers.extend(self.dimension_columns.iter().cloned());
        headers.push(PROCESSING_TIME_COLUMN.to_string());
        headers.push(EVENT_YEAR_COLUMN.to_string());
        headers.push(EVENT_MONTH_COLUMN.to_string());
        headers
    }

    /// Cells of one row, aligned with [`AnalyticsTable::headers`]
    pub fn row_values(&self, row: &AnalyticsRow) -> Vec<CellValue> {
        let mut values = Vec::with_capacity(self.dimension_columns.len() + 6);
        if self.include_row_id {
            values.push(
                row.row_id
                    .map(|id| CellValue::Integer(id as i64))
                    .unwrap_or(CellValue::Null),
            );
        }
        values.push(CellValue::text(row.observation_date.as_ref().map(format_iso)));
        values.push(CellValue::text(row.processed_date.as_ref().map(format_iso)));
        values.extend(row.categories.iter().cloned().map(CellValue::text));
        values.push(
            row.processing_time_days
                .map(CellValue::Real)
                .unwrap_or(CellValue::Null),
        );
        values.push(
            row.event_year
                .map(|y| CellValue::Integer(i64::from(y)))
                .unwrap_or(CellValue::Null),
        );
        values.push(
            row.event_month
                .map(|m| CellValue::Integer(i64::from(m)))
                .unwrap_or(CellValue::Null),
        );
        values
    }

    /// Category of `row` in dimension `column` (lower-cased name)
    pub fn category(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.dimension_columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.categories.get(col)?.as_deref()
    }
}

/// Column name used for a dimension type
pub fn dimension_column(dimension_type: &str) -> String {
    dimension_type.to_lowercase()
}

/// Pivots assignment records into an [`AnalyticsTable`]
#[derive(Debug, Clone, Copy)]
pub struct AnalyticsTableBuilder {
    include_row_id: bool,
}

impl Default for AnalyticsTableBuilder {
    fn default() -> Self {
        Self {
            include_row_id: true,
        }
    }
}

impl AnalyticsTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_id(mut self, include: bool) -> Self {
        self.include_row_id = include;
        self
    }

    pub fn build(&self, records: &[AssignmentRecord]) -> AnalyticsTable {
        // First pass: union of dimension columns across all records
        let mut dimension_columns: Vec<String> = Vec::new();
        let mut skipped: Vec<SkippedDimension> = Vec::new();
        for record in records {
            for (dimension, _) in record.assignments.iter() {
                let column = dimension_column(dimension);
                if RESERVED_COLUMNS.contains(&column.as_str()) {
                    if !skipped.iter().any(|s| s.dimension_type == dimension) {
                        warn!(
                            dimension,
                            column = column.as_str(),
                            "dimension collides with a fixed column, leaving it out"
                        );
                        skipped.push(SkippedDimension {
                            dimension_type: dimension.to_string(),
                            reason: OmitReason::ReservedColumn,
                        });
                    }
                    continue;
                }
                if !dimension_columns.contains(&column) {
                    dimension_columns.push(column);
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut categories = vec![None; dimension_columns.len()];
                for (dimension, category) in record.assignments.iter() {
                    let column = dimension_column(dimension);
                    if let Some(i) = dimension_columns.iter().position(|c| *c == column) {
                        categories[i] = Some(category.to_string());
                    }
                }

                let observation_date = record.observation_date.as_deref().and_then(parse_datetime);
                let processed_date = record.processed_date.as_deref().and_then(parse_datetime);

                AnalyticsRow {
                    row_id: self.include_row_id.then_some(record.row_index),
                    observation_date,
                    processed_date,
                    categories,
                    processing_time_days: processing_time_days(observation_date, processed_date),
                    event_year: observation_date.map(|d| d.local().year()),
                    event_month: observation_date.map(|d| d.local().month()),
                }
            })
            .collect();

        AnalyticsTable {
            include_row_id: self.include_row_id,
            dimension_columns,
            rows,
            skipped,
        }
    }
}

/// `(processed - observation)` in fractional days; negative when processed first.
///
/// Computed on instants, so differing offsets are accounted for.
pub fn processing_time_days(
    observation: Option<Timestamp>,
    processed: Option<Timestamp>,
) -> Option<f64> {
    let (observation, processed) = (observation?, processed?);
    let delta = processed.instant() - observation.instant();
    Some(delta.num_milliseconds() as f64 / MILLIS_PER_DAY)
}
