//! Per-dimension category matcher
//!
//! Every observation is compared against every category of one dimension.
//! A row keeps its best category only if the similarity clears the
//! threshold *and* the category wins enough rows dataset-wide. There is no
//! fallback to the second-best category.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{CategorizeError, CategorizeResult, OmitReason};
use crate::embedding::categories::DimensionEmbeddings;
use crate::embedding::embedder::cosine_similarity;

/// Default minimum similarity for accepting a best match
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.4;
/// Default minimum share of rows a category must win
pub const DEFAULT_MIN_SUPPORT_RATIO: f64 = 0.01;

/// Support statistics for a category that survived filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub dimension_type: String,
    pub category: String,
    /// Rows whose accepted best match is this category
    pub support_count: usize,
    /// `support_count / total_rows`, 0 when there are no rows
    pub support_ratio: f64,
    /// Mean best score over supporting rows, 0 when there are none
    pub mean_score: f64,
}

/// A category removed by the support filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedCategory {
    pub category: String,
    pub support_count: usize,
    pub support_ratio: f64,
    pub reason: OmitReason,
}

/// Result of matching one dimension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionMatch {
    pub dimension_type: String,
    /// Candidate category names; indices in `best` point into this list
    pub categories: Vec<String>,
    /// Stats for surviving categories, in category order
    pub stats: Vec<CategoryStats>,
    /// Final best category index per row, `None` when unassigned
    pub best: Vec<Option<usize>>,
    /// Raw best similarity per row, before any filtering
    pub best_scores: Vec<f32>,
    /// Why each unassigned row was left out; `None` for assigned rows
    pub row_omissions: Vec<Option<OmitReason>>,
    pub dropped: Vec<DroppedCategory>,
}

impl DimensionMatch {
    /// Match for a dimension without categories: every row unassigned
    pub fn unassigned(dimension_type: &str, rows: usize) -> Self {
        Self {
            dimension_type: dimension_type.to_string(),
            best: vec![None; rows],
            best_scores: vec![0.0; rows],
            row_omissions: vec![Some(OmitReason::EmptyDimension); rows],
            ..Default::default()
        }
    }

    pub fn stats_for(&self, category: &str) -> Option<&CategoryStats> {
        self.stats.iter().find(|s| s.category == category)
    }

    /// Best indices with `-1` for unassigned rows
    pub fn best_signed(&self) -> Vec<i64> {
        self.best
            .iter()
            .map(|b| b.map(|i| i as i64).unwrap_or(-1))
            .collect()
    }

    pub fn assigned_rows(&self) -> usize {
        self.best.iter().filter(|b| b.is_some()).count()
    }
}

/// Threshold + support matcher
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    similarity_threshold: f32,
    min_support_ratio: f64,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_MIN_SUPPORT_RATIO)
    }
}

impl Matcher {
    pub fn new(similarity_threshold: f32, min_support_ratio: f64) -> Self {
        Self {
            similarity_threshold,
            min_support_ratio,
        }
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    pub fn min_support_ratio(&self) -> f64 {
        self.min_support_ratio
    }

    /// Cosine similarity of every observation against every category
    /// (`rows x categories`).
    pub fn similarity_matrix(
        categories: &DimensionEmbeddings,
        observations: &[Vec<f32>],
    ) -> CategorizeResult<Vec<Vec<f32>>> {
        if let Some(expected) = categories.vectors().first().map(Vec::len) {
            let mismatch = categories
                .vectors()
                .iter()
                .chain(observations.iter())
                .find(|v| v.len() != expected);
            if let Some(v) = mismatch {
                return Err(CategorizeError::DimensionMismatch {
                    expected,
                    found: v.len(),
                });
            }
        }

        Ok(observations
            .iter()
            .map(|obs| {
                categories
                    .vectors()
                    .iter()
                    .map(|cat| cosine_similarity(obs, cat))
                    .collect()
            })
            .collect())
    }

    /// Match observation embeddings against one dimension's categories
    pub fn match_dimension(
        &self,
        categories: &DimensionEmbeddings,
        observations: &[Vec<f32>],
    ) -> CategorizeResult<DimensionMatch> {
        if categories.is_empty() {
            return Ok(DimensionMatch::unassigned(
                &categories.dimension_type,
                observations.len(),
            ));
        }

        let similarities = Self::similarity_matrix(categories, observations)?;
        Ok(self.match_similarities(
            &categories.dimension_type,
            categories.categories(),
            &similarities,
        ))
    }

    /// Apply threshold and support filtering to a precomputed similarity
    /// matrix with one row per observation and one column per category.
    pub fn match_similarities(
        &self,
        dimension_type: &str,
        categories: &[String],
        similarities: &[Vec<f32>],
    ) -> DimensionMatch {
        let total = similarities.len();
        if categories.is_empty() {
            return DimensionMatch::unassigned(dimension_type, total);
        }

        // Stable argmax: ties keep the lowest category index
        let raw_best: Vec<(usize, f32)> = similarities
            .iter()
            .map(|row| {
                let mut best = (0usize, row.first().copied().unwrap_or(f32::NAN));
                for (i, &score) in row.iter().enumerate().skip(1) {
                    if score > best.1 || (best.1.is_nan() && !score.is_nan()) {
                        best = (i, score);
                    }
                }
                best
            })
            .collect();

        let above: Vec<bool> = raw_best
            .iter()
            .map(|&(_, score)| score >= self.similarity_threshold)
            .collect();

        let mut stats = Vec::new();
        let mut dropped = Vec::new();
        let mut survives = vec![false; categories.len()];

        for (ci, name) in categories.iter().enumerate() {
            let (count, score_sum) = raw_best
                .iter()
                .zip(&above)
                .filter(|((idx, _), ok)| *idx == ci && **ok)
                .fold((0usize, 0.0f64), |(n, sum), ((_, score), _)| {
                    (n + 1, sum + f64::from(*score))
                });

            let ratio = if total > 0 {
                count as f64 / total as f64
            } else {
                0.0
            };

            if ratio >= self.min_support_ratio {
                survives[ci] = true;
                stats.push(CategoryStats {
                    dimension_type: dimension_type.to_string(),
                    category: name.clone(),
                    support_count: count,
                    support_ratio: ratio,
                    mean_score: if count > 0 { score_sum / count as f64 } else { 0.0 },
                });
            } else {
                debug!(
                    dimension = dimension_type,
                    category = name.as_str(),
                    support_count = count,
                    support_ratio = ratio,
                    reason = %OmitReason::LowSupport,
                    "dropping category"
                );
                dropped.push(DroppedCategory {
                    category: name.clone(),
                    support_count: count,
                    support_ratio: ratio,
                    reason: OmitReason::LowSupport,
                });
            }
        }

        let mut best = Vec::with_capacity(total);
        let mut row_omissions = Vec::with_capacity(total);
        for (&(idx, _), &ok) in raw_best.iter().zip(&above) {
            if !ok {
                best.push(None);
                row_omissions.push(Some(OmitReason::BelowThreshold));
            } else if !survives.get(idx).copied().unwrap_or(false) {
                best.push(None);
                row_omissions.push(Some(OmitReason::LowSupport));
            } else {
                best.push(Some(idx));
                row_omissions.push(None);
            }
        }

        DimensionMatch {
            dimension_type: dimension_type.to_string(),
            categories: categories.to_vec(),
            stats,
            best,
            best_scores: raw_best.iter().map(|&(_, s)| s).collect(),
            row_omissions,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    fn scenario() -> Vec<Vec<f32>> {
        vec![vec![0.9, 0.1], vec![0.2, 0.8], vec![0.3, 0.35]]
    }

    #[test]
    fn test_scenario_both_categories_kept() {
        let m = Matcher::new(0.4, 0.01).match_similarities(
            "OBSERVATION_TYPE",
            &names(&["hazard", "near_miss"]),
            &scenario(),
        );

        assert_eq!(m.best_signed(), vec![0, 1, -1]);
        assert_eq!(m.stats.len(), 2);
        for s in &m.stats {
            assert_eq!(s.support_count, 1);
            assert!((s.support_ratio - 1.0 / 3.0).abs() < 1e-12);
        }
        assert!((m.stats_for("hazard").unwrap().mean_score - 0.9).abs() < 1e-6);
        assert_eq!(
            m.row_omissions,
            vec![None, None, Some(OmitReason::BelowThreshold)]
        );
    }

    #[test]
    fn test_scenario_support_filter_unassigns_rows() {
        let m = Matcher::new(0.4, 0.5).match_similarities(
            "OBSERVATION_TYPE",
            &names(&["hazard", "near_miss"]),
            &scenario(),
        );

        assert!(m.stats.is_empty());
        assert_eq!(m.best_signed(), vec![-1, -1, -1]);
        assert_eq!(m.dropped.len(), 2);
        assert_eq!(
            m.row_omissions,
            vec![
                Some(OmitReason::LowSupport),
                Some(OmitReason::LowSupport),
                Some(OmitReason::BelowThreshold)
            ]
        );
    }

    #[test]
    fn test_no_fallback_to_second_best() {
        // row 0..2 pick cat0, row 3 picks cat1 which fails support
        let sims = vec![
            vec![0.9, 0.5],
            vec![0.8, 0.1],
            vec![0.7, 0.2],
            vec![0.6, 0.65],
        ];
        let m = Matcher::new(0.4, 0.3).match_similarities("D", &names(&["a", "b"]), &sims);

        assert_eq!(m.best, vec![Some(0), Some(0), Some(0), None]);
        assert!(m.stats_for("b").is_none());
        assert_eq!(m.stats_for("a").unwrap().support_count, 3);
    }

    #[test]
    fn test_ties_pick_lowest_index() {
        let sims = vec![vec![0.5, 0.7, 0.7]];
        let m = Matcher::new(0.4, 0.0).match_similarities("D", &names(&["a", "b", "c"]), &sims);
        assert_eq!(m.best, vec![Some(1)]);
    }

    #[test]
    fn test_empty_categories() {
        let dim = DimensionEmbeddings::new("LOCATION");
        let obs = vec![vec![1.0, 0.0]; 4];
        let m = Matcher::default().match_dimension(&dim, &obs).unwrap();

        assert!(m.stats.is_empty());
        assert_eq!(m.best_signed(), vec![-1; 4]);
        assert_eq!(m.row_omissions, vec![Some(OmitReason::EmptyDimension); 4]);
    }

    #[test]
    fn test_below_threshold_always_unassigned() {
        let sims = vec![vec![0.39], vec![0.41], vec![-0.2]];
        let m = Matcher::new(0.4, 0.0).match_similarities("D", &names(&["a"]), &sims);
        assert_eq!(m.best, vec![None, Some(0), None]);

        // stats count only rows above threshold
        let a = m.stats_for("a").unwrap();
        assert_eq!(a.support_count, 1);
        assert_eq!(
            a.support_count,
            (a.support_ratio * sims.len() as f64).round() as usize
        );
    }

    #[test]
    fn test_zero_rows() {
        let m = Matcher::new(0.4, 0.0).match_similarities("D", &names(&["a"]), &[]);
        assert!(m.best.is_empty());
        let a = m.stats_for("a").unwrap();
        assert_eq!(a.support_count, 0);
        assert_eq!(a.support_ratio, 0.0);
        assert_eq!(a.mean_score, 0.0);
    }

    #[test]
    fn test_match_dimension_is_pure() {
        let mut dim = DimensionEmbeddings::new("LOCATION");
        dim.push("office", vec![1.0, 0.0]);
        dim.push("warehouse", vec![0.0, 1.0]);
        let obs = vec![vec![0.9, 0.1], vec![0.1, 0.9], vec![0.7, 0.7]];

        let matcher = Matcher::new(0.4, 0.01);
        let first = matcher.match_dimension(&dim, &obs).unwrap();
        let second = matcher.match_dimension(&dim, &obs).unwrap();

        assert_eq!(first, second);
        // equal similarity on row 2 resolves to the first category
        assert_eq!(first.best, vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut dim = DimensionEmbeddings::new("LOCATION");
        dim.push("office", vec![1.0, 0.0]);
        let err = Matcher::default()
            .match_dimension(&dim, &[vec![1.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(
            err,
            CategorizeError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        ));
    }
}
