mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::categorize::CategorizeArgs;

const DEFAULT_LOG_FILTER: &str = "info,insight_categorizer=info";

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Categorize free-text observations by embedding similarity and query the results", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ===== Pipeline =====
    /// Run the full categorization pipeline over a dataset
    Categorize(CategorizeArgs),

    /// Rebuild the analytics table (SQLite + CSV) from an assignments file
    Analytics {
        /// Assignments JSON written by `categorize`
        assignments: PathBuf,
        #[arg(long, short, help = "Output directory (default: next to the assignments file)")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Run id used in artifact names (default: timestamp)")]
        run_id: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Reporting =====
    /// Run labelled SQL insight queries and save each result as CSV
    Insights {
        /// Analytics SQLite database
        db: PathBuf,
        /// SQL script with `-- LABEL` sections
        script: PathBuf,
        #[arg(long, short, default_value = "extracted_data", help = "Directory for result CSVs")]
        output_dir: PathBuf,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show category support from a category stats file
    Stats {
        /// Category stats JSON written by `categorize`
        stats: PathBuf,
        #[arg(
            long,
            default_value = "support_count",
            help = "Sort by support_count, support_ratio or mean_score"
        )]
        sort_by: String,
        #[arg(long, short = 'n', help = "Show only the first N categories")]
        top: Option<usize>,
        #[arg(long, help = "Sort ascending")]
        ascending: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== Model Management =====
    /// Manage the embedding model
    Model {
        /// Subcommand: download, status
        #[arg(default_value = "status")]
        action: String,
        #[arg(long, short, help = "Config file (default: insight.json)")]
        config: Option<PathBuf>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Categorize(args) => commands::categorize::run(&args),
        Commands::Analytics {
            assignments,
            output_dir,
            run_id,
            json,
        } => commands::analytics::run(&assignments, output_dir, run_id, json),
        Commands::Insights {
            db,
            script,
            output_dir,
            json,
        } => commands::insights::run(&db, &script, &output_dir, json),
        Commands::Stats {
            stats,
            sort_by,
            top,
            ascending,
            json,
        } => commands::stats::run(&stats, &sort_by, top, ascending, json),
        Commands::Model {
            action,
            config,
            json,
        } => commands::model::run(&action, config.as_deref(), json),
    }
}
