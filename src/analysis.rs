//! Category statistics reporting
//!
//! Flattens per-dimension stats into sortable rows, summarizes each
//! dimension, and collects example observations per matched category.

use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::matching::matcher::CategoryStats;
use crate::matching::multi::{DimensionStats, MultiMatch};

/// Column to order stats rows by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    SupportCount,
    SupportRatio,
    MeanScore,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "support_count" => Ok(SortKey::SupportCount),
            "support_ratio" => Ok(SortKey::SupportRatio),
            "mean_score" => Ok(SortKey::MeanScore),
            other => Err(format!(
                "unknown sort column '{}' (expected support_count, support_ratio or mean_score)",
                other
            )),
        }
    }
}

impl SortKey {
    fn compare(&self, a: &CategoryStats, b: &CategoryStats) -> Ordering {
        match self {
            SortKey::SupportCount => a.support_count.cmp(&b.support_count),
            SortKey::SupportRatio => a.support_ratio.total_cmp(&b.support_ratio),
            SortKey::MeanScore => a.mean_score.total_cmp(&b.mean_score),
        }
    }
}

/// All category stats as flat rows, dimension by dimension
pub fn flatten_stats(stats: &[DimensionStats]) -> Vec<CategoryStats> {
    stats
        .iter()
        .flat_map(|d| d.categories.iter().cloned())
        .collect()
}

/// Flat stats rows ordered by `key`, optionally cut to the first `top_n`
pub fn sorted_stats(
    stats: &[DimensionStats],
    key: SortKey,
    ascending: bool,
    top_n: Option<usize>,
) -> Vec<CategoryStats> {
    let mut rows = flatten_stats(stats);
    rows.sort_by(|a, b| {
        let ord = key.compare(a, b);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    if let Some(n) = top_n {
        rows.truncate(n);
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionSummary {
    pub dimension_type: String,
    pub active_categories: usize,
    pub total_support: usize,
}

pub fn summarize_dimensions(stats: &[DimensionStats]) -> Vec<DimensionSummary> {
    stats
        .iter()
        .map(|d| DimensionSummary {
            dimension_type: d.dimension_type.clone(),
            active_categories: d.categories.len(),
            total_support: d.categories.iter().map(|c| c.support_count).sum(),
        })
        .collect()
}

/// Example rows assigned to one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCluster {
    pub dimension_type: String,
    pub category: String,
    pub size: usize,
    /// `(row_index, text)` pairs, at most the requested number
    pub examples: Vec<(usize, String)>,
}

/// Group row texts by their assigned category, per dimension
pub fn cluster_examples(
    texts: &[String],
    matches: &MultiMatch,
    max_per_category: usize,
) -> Vec<CategoryCluster> {
    let mut clusters = Vec::new();

    for dim in matches.iter() {
        for (ci, category) in dim.categories.iter().enumerate() {
            let rows: Vec<usize> = dim
                .best
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == Some(ci))
                .map(|(row, _)| row)
                .collect();

            if rows.is_empty() {
                continue;
            }

            let examples = rows
                .iter()
                .take(max_per_category)
                .filter_map(|&row| texts.get(row).map(|t| (row, t.clone())))
                .collect();

            clusters.push(CategoryCluster {
                dimension_type: dim.dimension_type.clone(),
                category: category.clone(),
                size: rows.len(),
                examples,
            });
        }
    }

    clusters
}
