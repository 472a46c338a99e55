//! Persistence for assignment records, category stats and analytics tables

use anyhow::{Context, Result};
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use super::analytics::{
    AnalyticsTable, CellValue, EVENT_MONTH_COLUMN, EVENT_YEAR_COLUMN, PROCESSING_TIME_COLUMN,
    ROW_ID_COLUMN,
};
use super::assignment::AssignmentRecord;
use crate::core::error::CategorizeError;
use crate::matching::multi::DimensionStats;

/// Default SQLite table for the analytics table
pub const DEFAULT_TABLE_NAME: &str = "observations_enriched";

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write: {}", path.display()))
}

fn read_json_array<T: DeserializeOwned>(path: &Path, kind: &'static str) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}: {}", kind, path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| CategorizeError::invalid_document(kind, e.to_string()))?;

    if !value.is_array() {
        return Err(CategorizeError::invalid_document(kind, "expected a JSON array of records").into());
    }

    let records = serde_json::from_value(value)
        .map_err(|e| CategorizeError::invalid_document(kind, e.to_string()))?;
    Ok(records)
}

pub fn save_assignments(records: &[AssignmentRecord], path: &Path) -> Result<()> {
    write_json(records, path)?;
    info!(records = records.len(), path = %path.display(), "saved assignments");
    Ok(())
}

/// Read a persisted assignment file; anything but a JSON array is rejected
pub fn load_assignments(path: &Path) -> Result<Vec<AssignmentRecord>> {
    read_json_array(path, "assignments")
}

pub fn save_category_stats(stats: &[DimensionStats], path: &Path) -> Result<()> {
    write_json(stats, path)?;
    info!(dimensions = stats.len(), path = %path.display(), "saved category stats");
    Ok(())
}

pub fn load_category_stats(path: &Path) -> Result<Vec<DimensionStats>> {
    read_json_array(path, "category stats")
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(SqlValue::Null),
            CellValue::Text(s) => ToSqlOutput::from(s.as_str()),
            CellValue::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type(column: &str) -> &'static str {
    match column {
        ROW_ID_COLUMN | EVENT_YEAR_COLUMN | EVENT_MONTH_COLUMN => "INTEGER",
        PROCESSING_TIME_COLUMN => "REAL",
        _ => "TEXT",
    }
}

/// Write the table into SQLite, replacing `table_name` if it exists
pub fn save_to_sqlite(table: &AnalyticsTable, db_path: &Path, table_name: &str) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open analytics database: {}", db_path.display()))?;

    let headers = table.headers();
    let table_ident = quote_ident(table_name);
    let columns_sql = headers
        .iter()
        .map(|h| format!("{} {}", quote_ident(h), column_type(h)))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=headers.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({columns_sql});"
    ))?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {table_ident} VALUES ({placeholders})"
        ))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(table.row_values(row)))?;
        }
    }
    tx.commit()?;

    info!(
        rows = table.len(),
        table = table_name,
        path = %db_path.display(),
        "saved analytics table to sqlite"
    );
    Ok(())
}

pub fn save_to_csv(table: &AnalyticsTable, csv_path: &Path) -> Result<()> {
    if let Some(parent) = csv_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create CSV: {}", csv_path.display()))?;

    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(table.row_values(row).iter().map(CellValue::render))?;
    }
    writer.flush()?;

    info!(rows = table.len(), path = %csv_path.display(), "saved analytics table to csv");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::analytics::{processing_time_days, AnalyticsTableBuilder};
    use crate::assign::assignment::CategoryAssignments;
    use crate::core::observation::{format_iso, parse_datetime};

    fn records() -> Vec<AssignmentRecord> {
        let mut a = CategoryAssignments::new();
        a.insert("LOCATION", "office");
        let mut b = CategoryAssignments::new();
        b.insert("OBSERVATION_TYPE", "near_miss");
        vec![
            AssignmentRecord {
                row_index: 0,
                observation_date: Some("2024-01-01T00:00:00".to_string()),
                processed_date: Some("2024-01-03T00:00:00".to_string()),
                assignments: a,
            },
            AssignmentRecord {
                row_index: 1,
                observation_date: None,
                processed_date: None,
                assignments: b,
            },
        ]
    }

    #[test]
    fn test_assignments_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/assignments.json");

        save_assignments(&records(), &path).unwrap();
        let loaded = load_assignments(&path).unwrap();
        assert_eq!(loaded, records());
    }

    #[test]
    fn test_load_assignments_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.json");
        fs::write(&path, r#"{"row_index": 0}"#).unwrap();

        let err = load_assignments(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CategorizeError>(),
            Some(CategorizeError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_sqlite_export() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("analytics.db");
        let table = AnalyticsTableBuilder::new().build(&records());

        save_to_sqlite(&table, &db, DEFAULT_TABLE_NAME).unwrap();
        // second write replaces the table
        save_to_sqlite(&table, &db, DEFAULT_TABLE_NAME).unwrap();

        let conn = Connection::open(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observations_enriched", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let (location, days): (Option<String>, Option<f64>) = conn
            .query_row(
                "SELECT location, processing_time_days FROM observations_enriched WHERE row_id = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(location.as_deref(), Some("office"));
        assert_eq!(days, Some(2.0));

        let missing: Option<String> = conn
            .query_row(
                "SELECT location FROM observations_enriched WHERE row_id = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_sub_second_dates_survive_assignment_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.json");
        let observation = parse_datetime("2024-01-01T10:00:00.500");
        let processed = parse_datetime("2024-01-01T10:00:01");
        let direct = processing_time_days(observation, processed);

        let records = vec![AssignmentRecord {
            row_index: 0,
            observation_date: observation.as_ref().map(format_iso),
            processed_date: processed.as_ref().map(format_iso),
            assignments: CategoryAssignments::new(),
        }];
        save_assignments(&records, &path).unwrap();

        let loaded = load_assignments(&path).unwrap();
        assert_eq!(
            loaded[0].observation_date.as_deref(),
            Some("2024-01-01T10:00:00.500")
        );
        assert_eq!(loaded[0].processed_date.as_deref(), Some("2024-01-01T10:00:01"));

        let table = AnalyticsTableBuilder::new().build(&loaded);
        assert_eq!(table.rows()[0].processing_time_days, direct);
        assert_eq!(direct, Some(0.5 / 86_400.0));
    }

    #[test]
    fn test_sqlite_export_with_reserved_dimension_name() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("analytics.db");
        let mut assignments = CategoryAssignments::new();
        assignments.insert("PROCESSED_DATE", "late");
        assignments.insert("LOCATION", "roof");
        let records = vec![AssignmentRecord {
            row_index: 0,
            observation_date: Some("2024-01-01T00:00:00".to_string()),
            processed_date: Some("2024-01-02T00:00:00".to_string()),
            assignments,
        }];
        let table = AnalyticsTableBuilder::new().build(&records);

        save_to_sqlite(&table, &db, DEFAULT_TABLE_NAME).unwrap();

        let conn = Connection::open(&db).unwrap();
        let (location, processed): (String, String) = conn
            .query_row(
                "SELECT location, processed_date FROM observations_enriched",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(location, "roof");
        assert_eq!(processed, "2024-01-02T00:00:00");
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analytics.csv");
        let table = AnalyticsTableBuilder::new().build(&records());

        save_to_csv(&table, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "row_id,observation_date,processed_date,location,observation_type,processing_time_days,event_year,event_month"
        );
        assert_eq!(
            lines.next().unwrap(),
            "0,2024-01-01T00:00:00,2024-01-03T00:00:00,office,,2,2024,1"
        );
        assert_eq!(lines.next().unwrap(), "1,,,,near_miss,,,");
    }
}
