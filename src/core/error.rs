//! Error types for the categorization core
//!
//! Structural failures abort a run. Per-row and per-category anomalies are
//! not errors; they surface as [`OmitReason`] values next to the results.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CategorizeError {
    #[error("required column '{column}' not found (available: {})", available.join(", "))]
    Configuration {
        column: String,
        available: Vec<String>,
    },
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("categories cannot be embedded without an expansions document")]
    MissingExpansions,
    #[error("invalid {kind} document: {message}")]
    InvalidDocument { kind: &'static str, message: String },
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("vector dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl CategorizeError {
    pub fn missing_column(column: impl Into<String>, available: &[String]) -> Self {
        Self::Configuration {
            column: column.into(),
            available: available.to_vec(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_document(kind: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            kind,
            message: message.into(),
        }
    }
}

pub type CategorizeResult<T> = Result<T, CategorizeError>;

/// Why an item was left out of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OmitReason {
    /// Candidate value had no expansion entry
    MissingExpansion,
    /// Dimension had no candidate values left to embed
    EmptyDimension,
    /// Best similarity was under the acceptance threshold
    BelowThreshold,
    /// Winning category failed the minimum support filter
    LowSupport,
    /// Row or category index did not resolve
    IndexOutOfRange,
    /// Dimension had no assignment for the row
    NoAssignment,
    /// Dimension column name collides with a derived analytics column
    ReservedColumn,
}

impl OmitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OmitReason::MissingExpansion => "missing_expansion",
            OmitReason::EmptyDimension => "empty_dimension",
            OmitReason::BelowThreshold => "below_threshold",
            OmitReason::LowSupport => "low_support",
            OmitReason::IndexOutOfRange => "index_out_of_range",
            OmitReason::NoAssignment => "no_assignment",
            OmitReason::ReservedColumn => "reserved_column",
        }
    }
}

impl std::fmt::Display for OmitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message() {
        let err = CategorizeError::missing_column(
            "Title",
            &["Observation".to_string(), "Observation_date".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("'Title'"));
        assert!(msg.contains("Observation, Observation_date"));
    }

    #[test]
    fn test_omit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&OmitReason::LowSupport).unwrap();
        assert_eq!(json, "\"low_support\"");
        assert_eq!(OmitReason::IndexOutOfRange.to_string(), "index_out_of_range");
    }
}
