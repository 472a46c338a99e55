//! Categorize command - run the full pipeline over a dataset

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use insight_categorizer::analysis::{cluster_examples, summarize_dimensions};
use insight_categorizer::core::config::PipelineConfig;
use insight_categorizer::core::observation::RawTable;
use insight_categorizer::embedding::documents::{Expansions, IntentDocument};
use insight_categorizer::embedding::embedder::create_embedder;
use insight_categorizer::pipeline::{default_run_id, Pipeline};

#[derive(Args, Debug)]
pub struct CategorizeArgs {
    /// Observation dataset (CSV with a header row)
    pub dataset: PathBuf,

    #[arg(long, help = "Intent document (JSON with group_by)")]
    pub intent: PathBuf,

    #[arg(long, help = "Expansions document covering every dimension")]
    pub expansions: Option<PathBuf>,

    #[arg(
        long = "dimension-expansions",
        value_name = "DIMENSION=PATH",
        help = "Per-dimension expansions file (repeatable)"
    )]
    pub dimension_expansions: Vec<String>,

    #[arg(long, short, help = "Config file (default: insight.json)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Override similarity threshold")]
    pub threshold: Option<f32>,

    #[arg(long, help = "Override minimum support ratio")]
    pub min_support: Option<f64>,

    #[arg(long, help = "Only assign the first N rows")]
    pub max_examples: Option<usize>,

    #[arg(long, short, help = "Override output directory")]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Run id used in artifact names (default: timestamp)")]
    pub run_id: Option<String>,

    #[arg(long, help = "Override model id (\"hashing\" for the built-in embedder)")]
    pub model: Option<String>,

    #[arg(long, default_value = "0", help = "Show N example rows per category")]
    pub examples: usize,

    #[arg(long, help = "JSON output")]
    pub json: bool,
}

impl CategorizeArgs {
    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::load(self.config.as_deref());
        if let Some(threshold) = self.threshold {
            config.similarity_threshold = threshold;
        }
        if let Some(ratio) = self.min_support {
            config.min_support_ratio = ratio;
        }
        if self.max_examples.is_some() {
            config.max_examples = self.max_examples;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(model) = &self.model {
            config.model.model_id = model.clone();
            config.model.model_path = None;
        }
        config
    }

    fn expansions(&self) -> Result<Option<Expansions>> {
        let mut expansions = match &self.expansions {
            Some(path) => Some(Expansions::load(path)?),
            None => None,
        };

        for spec in &self.dimension_expansions {
            let Some((dimension, path)) = spec.split_once('=') else {
                bail!("Expected DIMENSION=PATH, got '{}'", spec);
            };
            expansions
                .get_or_insert_with(Expansions::new)
                .load_dimension(dimension.trim(), Path::new(path.trim()))?;
        }

        Ok(expansions)
    }
}

pub fn run(args: &CategorizeArgs) -> Result<()> {
    let config = args.config();
    let run_id = args.run_id.clone().unwrap_or_else(default_run_id);

    let dataset = RawTable::from_csv_path(&args.dataset)?;
    let intent = IntentDocument::load(&args.intent)?;
    let expansions = args.expansions()?;

    if !args.json {
        println!(
            "{} Loading model: {}",
            "→".dimmed(),
            config.model.model_id.cyan()
        );
    }
    let embedder = create_embedder(&config.model).context("Failed to load embedding model")?;

    let pipeline = Pipeline::new(config, embedder.as_ref());
    let result = pipeline.run(&dataset, &intent, expansions.as_ref(), &run_id)?;
    let cat = &result.categorization;
    let stats = cat.matches.stats();

    if args.json {
        let clusters = cluster_examples(
            &cat.observations.texts_for_embedding(),
            &cat.matches,
            args.examples,
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "run_id": result.run_id,
                "rows": cat.observations.len(),
                "records": cat.records.len(),
                "artifacts": {
                    "assignments": result.artifacts.assignments,
                    "category_stats": result.artifacts.category_stats,
                    "analytics_db": result.artifacts.analytics_db,
                    "analytics_csv": result.artifacts.analytics_csv,
                },
                "dimensions": summarize_dimensions(&stats),
                "category_stats": stats,
                "skipped_categories": cat.skipped_categories,
                "skipped_assignments": cat.skipped_assignments,
                "skipped_columns": result.table.skipped_dimensions(),
                "clusters": if args.examples > 0 { serde_json::to_value(clusters)? } else { serde_json::Value::Null },
            }))?
        );
        return Ok(());
    }

    println!();
    println!("{}", format!("Run {}", result.run_id).bold());
    println!(
        "  {} {} rows, {} assignment records",
        "→".dimmed(),
        cat.observations.len(),
        cat.records.len()
    );
    println!();

    for summary in summarize_dimensions(&stats) {
        println!(
            "  {} {} ({} categories, {} rows assigned)",
            "●".cyan(),
            summary.dimension_type.bold(),
            summary.active_categories,
            summary.total_support
        );
    }

    for dim in cat.matches.iter() {
        for dropped in &dim.dropped {
            println!(
                "  {} {}/{} dropped ({} rows, ratio {:.3})",
                "!".yellow().bold(),
                dim.dimension_type,
                dropped.category,
                dropped.support_count,
                dropped.support_ratio
            );
        }
    }

    if !cat.skipped_categories.is_empty() {
        println!();
        println!("{}", "Skipped categories".yellow());
        for skipped in &cat.skipped_categories {
            println!(
                "  {} {}/{}: {}",
                "-".dimmed(),
                skipped.dimension_type,
                skipped.category.as_deref().unwrap_or("*"),
                skipped.reason
            );
        }
    }

    if args.examples > 0 {
        println!();
        println!("{}", "Category examples".bold());
        let texts = cat.observations.texts_for_embedding();
        for cluster in cluster_examples(&texts, &cat.matches, args.examples) {
            println!(
                "  {} {}/{} ({})",
                "●".cyan(),
                cluster.dimension_type,
                cluster.category.green(),
                cluster.size
            );
            for (row, text) in cluster.examples {
                println!("      {} {}", format!("#{}", row).dimmed(), text);
            }
        }
    }

    println!();
    println!("{} Artifacts written:", "✓".green().bold());
    for path in [
        &result.artifacts.assignments,
        &result.artifacts.category_stats,
        &result.artifacts.analytics_db,
        &result.artifacts.analytics_csv,
    ] {
        println!("  {} {}", "→".dimmed(), path.display());
    }

    Ok(())
}
