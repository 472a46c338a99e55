//! Matching across all dimensions
//!
//! Dimensions are matched independently against the same read-only
//! observation matrix; nothing is shared or normalized between them.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::matcher::{CategoryStats, DimensionMatch, Matcher};
use crate::core::error::CategorizeResult;
use crate::embedding::categories::CategoryEmbeddings;

/// Per-dimension match results, in dimension order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiMatch {
    dimensions: Vec<DimensionMatch>,
}

impl MultiMatch {
    pub fn new(dimensions: Vec<DimensionMatch>) -> Self {
        Self { dimensions }
    }

    pub fn get(&self, dimension_type: &str) -> Option<&DimensionMatch> {
        self.dimensions
            .iter()
            .find(|d| d.dimension_type == dimension_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionMatch> {
        self.dimensions.iter()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Stats keyed by dimension, for persistence and reporting
    pub fn stats(&self) -> Vec<DimensionStats> {
        self.dimensions
            .iter()
            .map(|d| DimensionStats {
                dimension_type: d.dimension_type.clone(),
                categories: d.stats.clone(),
            })
            .collect()
    }
}

/// Surviving category stats of one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub dimension_type: String,
    pub categories: Vec<CategoryStats>,
}

/// Runs a [`Matcher`] over every dimension
pub struct MultiDimensionMatcher {
    matcher: Matcher,
}

impl MultiDimensionMatcher {
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher }
    }

    pub fn match_all(
        &self,
        categories: &CategoryEmbeddings,
        observations: &[Vec<f32>],
    ) -> CategorizeResult<MultiMatch> {
        let mut dimensions = Vec::with_capacity(categories.len());

        for dim in categories.iter() {
            let result = self.matcher.match_dimension(dim, observations)?;
            info!(
                dimension = dim.dimension_type.as_str(),
                active_categories = result.stats.len(),
                dropped_categories = result.dropped.len(),
                assigned_rows = result.assigned_rows(),
                total_rows = observations.len(),
                "matched dimension"
            );
            dimensions.push(result);
        }

        Ok(MultiMatch::new(dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::categories::DimensionEmbeddings;

    fn embeddings() -> CategoryEmbeddings {
        let mut location = DimensionEmbeddings::new("LOCATION");
        location.push("office", vec![1.0, 0.0]);
        location.push("warehouse", vec![0.0, 1.0]);

        let mut kind = DimensionEmbeddings::new("OBSERVATION_TYPE");
        kind.push("near_miss", vec![0.0, 1.0]);

        let mut all = CategoryEmbeddings::new();
        all.insert(location);
        all.insert(kind);
        all.insert(DimensionEmbeddings::new("EMPTY"));
        all
    }

    #[test]
    fn test_dimensions_are_independent() {
        let obs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let result = MultiDimensionMatcher::new(Matcher::new(0.4, 0.0))
            .match_all(&embeddings(), &obs)
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.get("LOCATION").unwrap().best, vec![Some(0), Some(1)]);
        // same row can match in several dimensions
        assert_eq!(result.get("OBSERVATION_TYPE").unwrap().best, vec![None, Some(0)]);
    }

    #[test]
    fn test_empty_dimension_kept_unassigned() {
        let obs = vec![vec![1.0, 0.0]; 3];
        let result = MultiDimensionMatcher::new(Matcher::default())
            .match_all(&embeddings(), &obs)
            .unwrap();

        let empty = result.get("EMPTY").unwrap();
        assert!(empty.stats.is_empty());
        assert_eq!(empty.best_signed(), vec![-1, -1, -1]);
    }

    #[test]
    fn test_order_follows_embeddings() {
        let result = MultiDimensionMatcher::new(Matcher::default())
            .match_all(&embeddings(), &[])
            .unwrap();
        let order: Vec<_> = result.iter().map(|d| d.dimension_type.as_str()).collect();
        assert_eq!(order, vec!["LOCATION", "OBSERVATION_TYPE", "EMPTY"]);

        let stats = result.stats();
        assert_eq!(stats.len(), 3);
    }
}
