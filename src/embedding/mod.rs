//! Embedding of observations and categories
//!
//! # Components
//!
//! - `embedder`: embedding model abstraction (Model2Vec, hashing fallback)
//! - `text`: canonical category text
//! - `documents`: intent and expansions documents
//! - `categories`: per-dimension category embeddings

pub mod categories;
pub mod documents;
pub mod embedder;
pub mod text;

pub use categories::{CategoryEmbeddings, DimensionEmbedder, DimensionEmbeddings, SkippedCategory};
pub use documents::{parse_llm_json, CategoryExpansion, DimensionSpec, Expansions, IntentDocument};
pub use embedder::{
    cosine_similarity, create_embedder, embed_texts, Embedder, HashingEmbedder, Model2VecEmbedder,
};
pub use text::build_category_text;
