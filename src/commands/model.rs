//! Model management commands - Download and inspect the embedding model

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use insight_categorizer::core::config::PipelineConfig;
use insight_categorizer::embedding::embedder::{create_embedder, HASHING_MODEL_ID};

/// Run model subcommand
pub fn run(subcmd: &str, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = PipelineConfig::load(config_path);
    match subcmd {
        "download" => download(&config, json),
        "status" => status(&config, json),
        _ => {
            if !json {
                println!("{} Unknown subcommand: {}", "!".yellow().bold(), subcmd);
                println!();
                println!("Available subcommands:");
                println!(
                    "  {} - Download and load the configured embedding model",
                    "download".cyan()
                );
                println!("  {} - Show model status", "status".cyan());
            }
            Ok(())
        }
    }
}

/// Fetch the model from the HuggingFace Hub (or local path) and probe it
fn download(config: &PipelineConfig, json: bool) -> Result<()> {
    let model_id = &config.model.model_id;

    if !json {
        if let Some(path) = config.model.model_path.as_deref() {
            println!("{} Loading model from local path: {}", "→".dimmed(), path);
        } else {
            println!("{} Downloading model: {}", "→".dimmed(), model_id.cyan());
            println!("  This may take a few minutes on first download...");
        }
    }

    match create_embedder(&config.model) {
        Ok(embedder) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "model_id": model_id,
                        "dimension": embedder.dimension(),
                        "name": embedder.name(),
                    })
                );
            } else {
                println!("{} Model ready!", "✓".green().bold());
                println!();
                println!("  {} Model: {}", "→".dimmed(), embedder.name());
                println!("  {} Dimension: {}", "→".dimmed(), embedder.dimension());
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    })
                );
            } else {
                println!("{} Failed to load model: {}", "✗".red().bold(), e);
                println!(
                    "  {} Use {} to run with the built-in hashing embedder",
                    "ℹ".blue(),
                    format!("--model {}", HASHING_MODEL_ID).cyan()
                );
            }
            Err(e)
        }
    }
}

/// Show configured model without loading it
fn status(config: &PipelineConfig, json: bool) -> Result<()> {
    let model = &config.model;
    let builtin = model.model_id == HASHING_MODEL_ID;
    let local = model
        .model_path
        .as_deref()
        .map(|p| Path::new(p).exists());

    if json {
        println!(
            "{}",
            serde_json::json!({
                "model_id": model.model_id,
                "model_path": model.model_path,
                "model_path_exists": local,
                "builtin": builtin,
                "batch_size": config.batch_size,
            })
        );
        return Ok(());
    }

    println!("{}", "Model Status".bold());
    println!();
    println!("  {} Model ID: {}", "→".dimmed(), model.model_id.cyan());
    println!("  {} Batch size: {}", "→".dimmed(), config.batch_size);

    match (model.model_path.as_deref(), local) {
        (Some(path), Some(true)) => {
            println!("  {} Local path: {}", "→".dimmed(), path.green());
        }
        (Some(path), _) => {
            println!(
                "  {} Local path missing: {} (falls back to model id)",
                "!".yellow().bold(),
                path
            );
        }
        (None, _) => {}
    }

    println!();
    if builtin {
        println!(
            "  {} Built-in hashing embedder, no download needed",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Run {} to fetch the model",
            "ℹ".blue(),
            "insight model download".cyan()
        );
        println!(
            "  {} HuggingFace cache: ~/.cache/huggingface/hub/",
            "ℹ".blue()
        );
    }

    Ok(())
}
