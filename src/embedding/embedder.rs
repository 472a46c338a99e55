//! Embedder trait and implementations
//!
//! Provides abstraction over different embedding models:
//! - HashingEmbedder: token-hashing projection (built-in, no model file)
//! - Model2VecEmbedder: static neural embeddings (requires model download)
//!
//! Every vector handed to the rest of the crate goes through [`embed_texts`],
//! which batches, checks the output count and unit-normalizes.

use anyhow::{Context, Result};
use model2vec::Model2Vec;
use std::path::Path;
use tracing::debug;

use crate::core::config::ModelConfig;
use crate::core::error::{CategorizeError, CategorizeResult};

/// Embedding model abstraction
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts, in input order
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .context("Embedder returned no vector")
    }

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Get model name/identifier
    fn name(&self) -> &str;
}

/// Embed `texts` in chunks of `batch_size`, preserving input order.
///
/// Output vectors are unit length (zero vectors stay zero).
pub fn embed_texts<S: AsRef<str>>(
    embedder: &dyn Embedder,
    texts: &[S],
    batch_size: usize,
) -> CategorizeResult<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for (batch_no, chunk) in texts.chunks(batch_size).enumerate() {
        let refs: Vec<&str> = chunk.iter().map(AsRef::as_ref).collect();
        let batch = embedder
            .embed_batch(&refs)
            .map_err(|e| CategorizeError::Embedding(format!("{:#}", e)))?;

        if batch.len() != refs.len() {
            return Err(CategorizeError::Embedding(format!(
                "batch {} returned {} vectors for {} texts",
                batch_no,
                batch.len(),
                refs.len()
            )));
        }

        vectors.extend(batch.into_iter().map(normalize));
    }

    debug!(
        model = embedder.name(),
        texts = texts.len(),
        batch_size,
        "embedded texts"
    );

    Ok(vectors)
}

/// Scale a vector to unit length
pub fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ============================================================================
// Hashing Embedder
// ============================================================================

/// Model id selecting the built-in hashing embedder
pub const HASHING_MODEL_ID: &str = "hashing";

pub const HASHING_DIM: usize = 256;

/// Bag-of-tokens embedder projecting hashed tokens into a fixed space.
///
/// No model download, fully deterministic. Only lexical overlap is captured.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(HASHING_DIM)
    }

    pub fn with_dimension(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(token.as_bytes());
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

// ============================================================================
// Model2Vec Embedder
// ============================================================================

/// Model2Vec embedding dimension (potion-base-8M uses 256d)
pub const MODEL2VEC_DIM: usize = 256;

/// Model2Vec based embedder
pub struct Model2VecEmbedder {
    model: Model2Vec,
    model_path: String,
    dim: usize,
}

impl Model2VecEmbedder {
    /// Load model from local path
    pub fn from_path(path: &Path) -> Result<Self> {
        let model = Model2Vec::from_pretrained(path.to_string_lossy().as_ref(), None, None)
            .with_context(|| format!("Failed to load Model2Vec from: {}", path.display()))?;

        Self::probe(model, path.to_string_lossy().to_string())
    }

    /// Load model from HuggingFace Hub
    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        let model = Model2Vec::from_pretrained(model_id, None, None)
            .with_context(|| format!("Failed to load Model2Vec: {}", model_id))?;

        Self::probe(model, model_id.to_string())
    }

    // Output width differs between model variants, so read it off a probe.
    fn probe(model: Model2Vec, model_path: String) -> Result<Self> {
        let probe = model.encode(&["probe"]).context("Failed to encode probe text")?;
        let dim = probe.ncols();
        Ok(Self {
            model,
            model_path,
            dim: if dim == 0 { MODEL2VEC_DIM } else { dim },
        })
    }
}

impl Embedder for Model2VecEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.model.encode(texts).context("Failed to encode texts")?;
        Ok(embeddings.rows().into_iter().map(|r| r.to_vec()).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        &self.model_path
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create embedder based on configuration.
///
/// A local `model_path` wins over the HuggingFace `model_id`.
pub fn create_embedder(config: &ModelConfig) -> Result<Box<dyn Embedder>> {
    if config.model_id == HASHING_MODEL_ID {
        return Ok(Box::new(HashingEmbedder::new()));
    }

    if let Some(path) = config.model_path.as_deref() {
        let path = Path::new(path);
        if path.exists() {
            return Ok(Box::new(Model2VecEmbedder::from_path(path)?));
        }
        tracing::warn!(
            path = %path.display(),
            "model path does not exist, falling back to model id"
        );
    }

    Ok(Box::new(Model2VecEmbedder::from_pretrained(&config.model_id)?))
}
