//! Per-dimension category embeddings
//!
//! Only categories with an expansion record are embedded. A dimension left
//! with no categories is dropped from the output.

use serde::Serialize;
use tracing::{debug, info};

use super::documents::{Expansions, IntentDocument};
use super::embedder::{embed_texts, Embedder};
use super::text::build_category_text;
use crate::core::error::{CategorizeError, CategorizeResult, OmitReason};

/// Ordered `category name -> vector` mapping for one dimension
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionEmbeddings {
    pub dimension_type: String,
    categories: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl DimensionEmbeddings {
    pub fn new(dimension_type: impl Into<String>) -> Self {
        Self {
            dimension_type: dimension_type.into(),
            categories: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Append a category. Replaces the vector when the name is already present.
    pub fn push(&mut self, category: impl Into<String>, vector: Vec<f32>) {
        let category = category.into();
        match self.categories.iter().position(|c| *c == category) {
            Some(i) => self.vectors[i] = vector,
            None => {
                self.categories.push(category);
                self.vectors.push(vector);
            }
        }
    }

    /// Category names in insertion order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn get(&self, category: &str) -> Option<&[f32]> {
        self.categories
            .iter()
            .position(|c| c == category)
            .map(|i| self.vectors[i].as_slice())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Category embeddings for every embedded dimension, in intent order
#[derive(Debug, Clone, Default)]
pub struct CategoryEmbeddings {
    dimensions: Vec<DimensionEmbeddings>,
}

impl CategoryEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dimension, replacing one with the same type in place
    pub fn insert(&mut self, dimension: DimensionEmbeddings) {
        match self
            .dimensions
            .iter_mut()
            .find(|d| d.dimension_type == dimension.dimension_type)
        {
            Some(existing) => *existing = dimension,
            None => self.dimensions.push(dimension),
        }
    }

    pub fn get(&self, dimension_type: &str) -> Option<&DimensionEmbeddings> {
        self.dimensions
            .iter()
            .find(|d| d.dimension_type == dimension_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionEmbeddings> {
        self.dimensions.iter()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// A candidate value or dimension that was not embedded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCategory {
    pub dimension_type: String,
    pub category: Option<String>,
    pub reason: OmitReason,
}

/// Embeds the candidate categories of each intent dimension
pub struct DimensionEmbedder<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
}

impl<'a> DimensionEmbedder<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            batch_size: 32,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Embed the valid categories of every dimension in `intent`.
    ///
    /// Fails with [`CategorizeError::MissingExpansions`] when no expansions
    /// document was supplied at all.
    pub fn embed_categories(
        &self,
        intent: &IntentDocument,
        expansions: Option<&Expansions>,
    ) -> CategorizeResult<(CategoryEmbeddings, Vec<SkippedCategory>)> {
        let expansions = expansions.ok_or(CategorizeError::MissingExpansions)?;

        let mut output = CategoryEmbeddings::new();
        let mut skipped = Vec::new();

        for group in &intent.group_by {
            let dim = group.dimension_type.as_str();

            let mut valid = Vec::new();
            let mut texts = Vec::new();
            for value in group.unique_values() {
                match expansions.get(dim, value) {
                    Some(expansion) => {
                        texts.push(build_category_text(expansion));
                        valid.push(value);
                    }
                    None => {
                        debug!(dimension = dim, category = value, "no expansion, skipping category");
                        skipped.push(SkippedCategory {
                            dimension_type: dim.to_string(),
                            category: Some(value.to_string()),
                            reason: OmitReason::MissingExpansion,
                        });
                    }
                }
            }

            if valid.is_empty() {
                // a repeated dimension type keeps whatever was embedded earlier
                if output.get(dim).is_none() {
                    info!(dimension = dim, "no embeddable categories, dropping dimension");
                    skipped.push(SkippedCategory {
                        dimension_type: dim.to_string(),
                        category: None,
                        reason: OmitReason::EmptyDimension,
                    });
                }
                continue;
            }

            let vectors = embed_texts(self.embedder, &texts, self.batch_size)?;

            let mut dimension = DimensionEmbeddings::new(dim);
            for (name, vector) in valid.into_iter().zip(vectors) {
                dimension.push(name, vector);
            }

            debug!(dimension = dim, categories = dimension.len(), "embedded categories");
            output.insert(dimension);
        }

        Ok((output, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embedder::HashingEmbedder;

    fn intent() -> IntentDocument {
        IntentDocument::parse(
            r#"{"group_by": [
                {"dimension_type": "LOCATION", "values": ["office", "warehouse", "office", "roof"]},
                {"dimension_type": "RISK", "values": ["fall"]},
                {"dimension_type": "EMPTY", "values": []}
            ]}"#,
        )
        .unwrap()
    }

    fn expansions() -> Expansions {
        Expansions::parse(
            r#"{"LOCATION": {
                "office": {"name": "office", "description": "desks and meeting rooms"},
                "warehouse": {"name": "warehouse", "description": "storage racks", "examples": ["pallet fell"]}
            }}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_requires_expansions() {
        let embedder = HashingEmbedder::new();
        let err = DimensionEmbedder::new(&embedder)
            .embed_categories(&intent(), None)
            .unwrap_err();
        assert!(matches!(err, CategorizeError::MissingExpansions));
    }

    #[test]
    fn test_drops_unexpanded_categories_and_dimensions() {
        let embedder = HashingEmbedder::new();
        let exp = expansions();
        let (embeddings, skipped) = DimensionEmbedder::new(&embedder)
            .embed_categories(&intent(), Some(&exp))
            .unwrap();

        assert_eq!(embeddings.len(), 1);
        let location = embeddings.get("LOCATION").unwrap();
        assert_eq!(location.categories(), &["office", "warehouse"]);
        assert_eq!(location.vectors().len(), 2);
        assert!(embeddings.get("RISK").is_none());
        assert!(embeddings.get("EMPTY").is_none());

        assert!(skipped.contains(&SkippedCategory {
            dimension_type: "LOCATION".to_string(),
            category: Some("roof".to_string()),
            reason: OmitReason::MissingExpansion,
        }));
        assert!(skipped.contains(&SkippedCategory {
            dimension_type: "RISK".to_string(),
            category: None,
            reason: OmitReason::EmptyDimension,
        }));
    }

    #[test]
    fn test_repeated_dimension_without_values_keeps_earlier_entry() {
        let embedder = HashingEmbedder::new();
        let exp = expansions();
        let intent = IntentDocument::parse(
            r#"{"group_by": [
                {"dimension_type": "LOCATION", "values": ["office"]},
                {"dimension_type": "LOCATION", "values": ["roof"]}
            ]}"#,
        )
        .unwrap();

        let (embeddings, skipped) = DimensionEmbedder::new(&embedder)
            .embed_categories(&intent, Some(&exp))
            .unwrap();

        assert_eq!(embeddings.get("LOCATION").unwrap().categories(), &["office"]);
        assert_eq!(
            skipped,
            vec![SkippedCategory {
                dimension_type: "LOCATION".to_string(),
                category: Some("roof".to_string()),
                reason: OmitReason::MissingExpansion,
            }]
        );
    }

    #[test]
    fn test_vectors_follow_category_text() {
        let embedder = HashingEmbedder::new();
        let exp = expansions();
        let (embeddings, _) = DimensionEmbedder::new(&embedder)
            .with_batch_size(1)
            .embed_categories(&intent(), Some(&exp))
            .unwrap();

        let text = build_category_text(exp.get("LOCATION", "warehouse").unwrap());
        let expected = embed_texts(&embedder, &[text], 1).unwrap().remove(0);
        assert_eq!(embeddings.get("LOCATION").unwrap().get("warehouse").unwrap(), &expected[..]);
    }

    #[test]
    fn test_push_replaces_existing() {
        let mut dim = DimensionEmbeddings::new("LOCATION");
        dim.push("office", vec![1.0, 0.0]);
        dim.push("office", vec![0.0, 1.0]);
        assert_eq!(dim.len(), 1);
        assert_eq!(dim.get("office").unwrap(), &[0.0, 1.0]);
    }
}
