//! Insight queries over the analytics database
//!
//! A script holds one or more SELECT statements, each introduced by a
//! `-- LABEL` comment line:
//!
//! ```text
//! -- MAIN QUERY
//! SELECT location, COUNT(*) FROM observations_enriched GROUP BY location;
//!
//! -- EXTRA INSIGHT QUERY 1
//! SELECT event_month, AVG(processing_time_days) FROM observations_enriched GROUP BY event_month;
//! ```
//!
//! Text before the first label belongs to `main_query`.

use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::assign::analytics::CellValue;

pub const MAIN_QUERY_LABEL: &str = "main_query";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightQuery {
    pub label: String,
    pub sql: String,
}

fn normalize_label(line: &str) -> String {
    line.trim_start_matches(|c: char| c == '-' || c == ' ')
        .trim()
        .to_lowercase()
        .replace(' ', "_")
}

/// Split a labelled script into queries, in label order.
///
/// Repeated labels append to the same query; empty queries are dropped.
pub fn parse_labelled_sql(script: &str) -> Vec<InsightQuery> {
    let mut blocks: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in script.lines() {
        let trimmed = line.trim();
        let label = if trimmed.starts_with("--") {
            Some(normalize_label(trimmed))
        } else if current.is_none() {
            Some(MAIN_QUERY_LABEL.to_string())
        } else {
            None
        };

        if let Some(label) = label {
            let idx = match blocks.iter().position(|(l, _)| *l == label) {
                Some(i) => i,
                None => {
                    blocks.push((label, Vec::new()));
                    blocks.len() - 1
                }
            };
            current = Some(idx);
            if trimmed.starts_with("--") {
                continue;
            }
        }

        if let Some(idx) = current {
            blocks[idx].1.push(line);
        }
    }

    blocks
        .into_iter()
        .filter_map(|(label, lines)| {
            let sql = lines.join("\n").trim().to_string();
            (!sql.is_empty()).then_some(InsightQuery { label, sql })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub label: String,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn cell_from_sql(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Real(round2(f)),
        ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => CellValue::Text(format!("<{} bytes>", b.len())),
    }
}

/// Run every query against the database at `db_path`.
///
/// Real values are rounded to two decimals. Queries returning no rows are
/// left out of the result.
pub fn execute_queries(db_path: &Path, queries: &[InsightQuery]) -> Result<Vec<QueryResult>> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open analytics database: {}", db_path.display()))?;

    let mut results = Vec::new();
    for query in queries {
        let mut stmt = conn
            .prepare(&query.sql)
            .with_context(|| format!("Failed to prepare query '{}'", query.label))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(cell_from_sql))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .with_context(|| format!("Failed to run query '{}'", query.label))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if rows.is_empty() {
            info!(label = query.label.as_str(), "query returned no rows, skipping");
            continue;
        }

        info!(label = query.label.as_str(), rows = rows.len(), "executed insight query");
        results.push(QueryResult {
            label: query.label.clone(),
            sql: query.sql.clone(),
            columns,
            rows,
        });
    }

    Ok(results)
}

/// File stem for a query label
pub fn safe_label(label: &str) -> String {
    let replaced = label.replace([' ', '/'], "_");
    replaced.split(':').next().unwrap_or_default().to_string()
}

/// Write each result to `<output_dir>/<safe_label>.csv`
pub fn save_results_csv(results: &[QueryResult], output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create: {}", output_dir.display()))?;

    let mut paths = Vec::with_capacity(results.len());
    for result in results {
        let path = output_dir.join(format!("{}.csv", safe_label(&result.label)));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create CSV: {}", path.display()))?;
        writer.write_record(&result.columns)?;
        for row in &result.rows {
            writer.write_record(row.iter().map(CellValue::render))?;
        }
        writer.flush()?;
        paths.push(path);
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labelled_script() {
        let script = "-- MAIN QUERY\nSELECT 1;\n\n-- EXTRA INSIGHT QUERY 1\nSELECT 2;\n-- EMPTY ONE\n";
        let queries = parse_labelled_sql(script);

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].label, "main_query");
        assert_eq!(queries[0].sql, "SELECT 1;");
        assert_eq!(queries[1].label, "extra_insight_query_1");
        assert_eq!(queries[1].sql, "SELECT 2;");
    }

    #[test]
    fn test_unlabelled_script_is_main_query() {
        let queries = parse_labelled_sql("SELECT *\nFROM t");
        assert_eq!(
            queries,
            vec![InsightQuery {
                label: "main_query".to_string(),
                sql: "SELECT *\nFROM t".to_string()
            }]
        );
    }

    #[test]
    fn test_safe_label() {
        assert_eq!(safe_label("extra insight/query: by month"), "extra_insight_query");
        assert_eq!(safe_label("main_query"), "main_query");
    }

    #[test]
    fn test_execute_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("a.db");
        {
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch(
                "CREATE TABLE t (loc TEXT, days REAL);
                 INSERT INTO t VALUES ('office', 1.234), ('office', 2.0), ('roof', NULL);",
            )
            .unwrap();
        }

        let queries = parse_labelled_sql(
            "-- MAIN QUERY\nSELECT loc, AVG(days) AS avg_days FROM t GROUP BY loc ORDER BY loc;\n\
             -- NOTHING\nSELECT * FROM t WHERE loc = 'nowhere';",
        );
        let results = execute_queries(&db, &queries).unwrap();

        assert_eq!(results.len(), 1);
        let main = &results[0];
        assert_eq!(main.columns, vec!["loc", "avg_days"]);
        assert_eq!(main.rows[0][1], CellValue::Real(1.62));
        assert_eq!(main.rows[1][1], CellValue::Null);

        let out = dir.path().join("extracted");
        let paths = save_results_csv(&results, &out).unwrap();
        assert_eq!(paths, vec![out.join("main_query.csv")]);
        let content = fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(content, "loc,avg_days\noffice,1.62\nroof,\n");
    }
}
