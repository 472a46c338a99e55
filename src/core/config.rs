//! Pipeline configuration
//!
//! Config loading priority:
//! 1. Explicit `--config` path given on the command line
//! 2. `insight.json` in the current directory
//! 3. Built-in defaults
//!
//! Every field carries a serde default, so partial config files are valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::error::{CategorizeError, CategorizeResult};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "insight.json";
pub const CONFIG_VERSION: u32 = 1;

/// Default Model2Vec model ID
pub const DEFAULT_MODEL2VEC_MODEL: &str = "minishlab/potion-base-8M";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Minimum cosine similarity for a row to accept its best category
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Minimum share of all rows a category must win to be kept
    #[serde(default = "default_min_support_ratio")]
    pub min_support_ratio: f64,

    /// Cap on the number of assignment records exported
    #[serde(default)]
    pub max_examples: Option<usize>,

    /// Texts per embedding call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_similarity_threshold() -> f32 {
    0.4
}

fn default_min_support_ratio() -> f64 {
    0.01
}

fn default_batch_size() -> usize {
    32
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

/// Input dataset column names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_title_column")]
    pub title: String,

    #[serde(default = "default_body_column")]
    pub body: String,

    #[serde(default = "default_observation_date_column")]
    pub observation_date: String,

    #[serde(default = "default_processed_date_column")]
    pub processed_date: String,
}

fn default_title_column() -> String {
    "Title".to_string()
}

fn default_body_column() -> String {
    "Observation".to_string()
}

fn default_observation_date_column() -> String {
    "Observation_date".to_string()
}

fn default_processed_date_column() -> String {
    "Processed_date".to_string()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            title: default_title_column(),
            body: default_body_column(),
            observation_date: default_observation_date_column(),
            processed_date: default_processed_date_column(),
        }
    }
}

impl ColumnConfig {
    /// Columns that must exist in the input table
    pub fn required(&self) -> [&str; 4] {
        [
            &self.title,
            &self.body,
            &self.observation_date,
            &self.processed_date,
        ]
    }
}

/// Embedding model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_id", rename = "modelId")]
    pub model_id: String,

    #[serde(default, rename = "modelPath")]
    pub model_path: Option<String>,
}

fn default_model_id() -> String {
    DEFAULT_MODEL2VEC_MODEL.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            model_path: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            similarity_threshold: default_similarity_threshold(),
            min_support_ratio: default_min_support_ratio(),
            max_examples: None,
            batch_size: default_batch_size(),
            columns: ColumnConfig::default(),
            model: ModelConfig::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl PipelineConfig {
    /// Load config from an explicit path, or from the working directory.
    /// Falls back to defaults when no file is usable.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !path.exists() {
            if explicit.is_some() {
                warn!(path = %path.display(), "config file not found, using defaults");
            }
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(config) => {
                if config.version > CONFIG_VERSION {
                    warn!(
                        version = config.version,
                        supported = CONFIG_VERSION,
                        "config version is newer than supported"
                    );
                }
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check threshold ranges before any work is done
    pub fn validate(&self) -> CategorizeResult<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(CategorizeError::invalid_config(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_support_ratio) {
            return Err(CategorizeError::invalid_config(format!(
                "min_support_ratio must be within [0, 1], got {}",
                self.min_support_ratio
            )));
        }
        if self.batch_size == 0 {
            return Err(CategorizeError::invalid_config("batch_size must be positive"));
        }
        Ok(())
    }
}
