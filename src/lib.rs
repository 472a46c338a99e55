//! Insight categorizer
//!
//! Assigns free-text observations to categories across several dimensions
//! by embedding similarity, then pivots the assignments into an analytics
//! table for SQL insight queries.

pub mod analysis;
pub mod assign;
pub mod core;
pub mod embedding;
pub mod insights;
pub mod matching;
pub mod pipeline;

pub use crate::core::config::PipelineConfig;
pub use crate::core::error::{CategorizeError, CategorizeResult, OmitReason};
pub use crate::pipeline::{Pipeline, PipelineRun, RunArtifacts};
