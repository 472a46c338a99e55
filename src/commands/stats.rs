//! Stats command - report category support from a stats file

use anyhow::{anyhow, Result};
use colored::Colorize;
use std::path::Path;

use insight_categorizer::analysis::{sorted_stats, summarize_dimensions, SortKey};
use insight_categorizer::assign::store::load_category_stats;

pub fn run(
    stats_path: &Path,
    sort_by: &str,
    top_n: Option<usize>,
    ascending: bool,
    json: bool,
) -> Result<()> {
    let key: SortKey = sort_by.parse().map_err(|e: String| anyhow!(e))?;
    let stats = load_category_stats(stats_path)?;
    let rows = sorted_stats(&stats, key, ascending, top_n);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "dimensions": summarize_dimensions(&stats),
                "categories": rows,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Category Support".bold());
    println!();
    for summary in summarize_dimensions(&stats) {
        println!(
            "  {} {}: {} categories, {} rows",
            "→".dimmed(),
            summary.dimension_type.cyan(),
            summary.active_categories,
            summary.total_support
        );
    }
    println!();

    if rows.is_empty() {
        println!("  {} No categories survived matching", "!".yellow().bold());
        return Ok(());
    }

    println!(
        "  {:<24} {:<28} {:>8} {:>8} {:>8}",
        "DIMENSION".dimmed(),
        "CATEGORY".dimmed(),
        "COUNT".dimmed(),
        "RATIO".dimmed(),
        "SCORE".dimmed()
    );
    for row in rows {
        println!(
            "  {:<24} {:<28} {:>8} {:>8.3} {:>8.3}",
            row.dimension_type, row.category, row.support_count, row.support_ratio, row.mean_score
        );
    }

    Ok(())
}
