//! Insights command - run labelled SQL queries against an analytics database

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use insight_categorizer::assign::analytics::CellValue;
use insight_categorizer::insights::{execute_queries, parse_labelled_sql, save_results_csv};

const PREVIEW_ROWS: usize = 10;

pub fn run(db: &Path, script: &Path, output_dir: &Path, json: bool) -> Result<()> {
    if !db.exists() {
        bail!("Analytics database not found: {}", db.display());
    }
    let sql = fs::read_to_string(script)
        .with_context(|| format!("Failed to read SQL script: {}", script.display()))?;

    let queries = parse_labelled_sql(&sql);
    if queries.is_empty() {
        bail!("No queries found in {}", script.display());
    }

    let results = execute_queries(db, &queries)?;
    let paths = save_results_csv(&results, output_dir)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "queries": queries.len(),
                "results": results,
                "files": paths,
            }))?
        );
        return Ok(());
    }

    for result in &results {
        println!();
        println!("{} ({} rows)", result.label.bold().cyan(), result.rows.len());
        println!("  {}", result.columns.join(" | ").dimmed());
        for row in result.rows.iter().take(PREVIEW_ROWS) {
            let cells: Vec<String> = row.iter().map(CellValue::render).collect();
            println!("  {}", cells.join(" | "));
        }
        if result.rows.len() > PREVIEW_ROWS {
            println!("  {}", format!("... {} more", result.rows.len() - PREVIEW_ROWS).dimmed());
        }
    }

    let empty = queries.len() - results.len();
    println!();
    if empty > 0 {
        println!("{} {} queries returned no rows", "!".yellow().bold(), empty);
    }
    println!("{} Saved {} result files:", "✓".green().bold(), paths.len());
    for path in &paths {
        println!("  {} {}", "→".dimmed(), path.display());
    }

    Ok(())
}
