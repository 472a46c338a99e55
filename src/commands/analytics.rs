//! Analytics command - rebuild the analytics table from an assignments file

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use insight_categorizer::pipeline::{build_analytics, default_run_id, RunArtifacts};

pub fn run(
    assignments: &Path,
    output_dir: Option<PathBuf>,
    run_id: Option<String>,
    json: bool,
) -> Result<()> {
    let output_dir = output_dir
        .or_else(|| assignments.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let run_id = run_id.unwrap_or_else(default_run_id);
    let artifacts = RunArtifacts::new(&output_dir, &run_id);

    let table = build_analytics(assignments, &artifacts)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "run_id": run_id,
                "rows": table.len(),
                "columns": table.headers(),
                "analytics_db": artifacts.analytics_db,
                "analytics_csv": artifacts.analytics_csv,
            })
        );
        return Ok(());
    }

    println!(
        "{} Analytics table: {} rows, {} dimension columns",
        "✓".green().bold(),
        table.len(),
        table.dimension_columns().len()
    );
    if !table.dimension_columns().is_empty() {
        println!(
            "  {} Dimensions: {}",
            "→".dimmed(),
            table.dimension_columns().join(", ").cyan()
        );
    }
    println!("  {} {}", "→".dimmed(), artifacts.analytics_db.display());
    println!("  {} {}", "→".dimmed(), artifacts.analytics_csv.display());

    Ok(())
}
