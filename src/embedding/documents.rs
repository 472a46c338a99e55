//! Intent and expansions documents
//!
//! Both documents are produced by a text-generation step upstream and may
//! arrive wrapped in prose or with trailing commas, so loading goes through
//! [`parse_llm_json`].

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::core::error::{CategorizeError, CategorizeResult};

lazy_static::lazy_static! {
    static ref TRAILING_COMMA: regex::Regex = regex::Regex::new(r",\s*([}\]])").unwrap();
}

/// Parse JSON that may be surrounded by extra text.
///
/// Tries, in order: the raw text, the outermost `{...}` block, and that
/// block with trailing commas removed.
pub fn parse_llm_json(raw: &str, kind: &'static str) -> CategorizeResult<Value> {
    let raw = raw.trim();

    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    let (first, last) = match (raw.find('{'), raw.rfind('}')) {
        (Some(first), Some(last)) if last > first => (first, last),
        _ => {
            return Err(CategorizeError::invalid_document(
                kind,
                "no JSON object found in input",
            ))
        }
    };
    let candidate = &raw[first..=last];

    if let Ok(value) = serde_json::from_str(candidate) {
        debug!(kind, "parsed JSON after trimming surrounding text");
        return Ok(value);
    }

    let fixed = TRAILING_COMMA.replace_all(candidate, "$1");
    serde_json::from_str(&fixed).map_err(|e| CategorizeError::invalid_document(kind, e.to_string()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One grouping axis requested by the intent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub dimension_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<String>,
}

impl DimensionSpec {
    /// Candidate values with duplicates removed, first occurrence wins
    pub fn unique_values(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.values
            .iter()
            .map(String::as_str)
            .filter(|v| seen.insert(*v))
            .collect()
    }
}

/// Semantic intent of an analytics question.
///
/// Only `group_by` is read by the categorizer; everything else is carried
/// through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub group_by: Vec<DimensionSpec>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IntentDocument {
    pub fn parse(raw: &str) -> CategorizeResult<Self> {
        let value = parse_llm_json(raw, "intent")?;
        serde_json::from_value(value)
            .map_err(|e| CategorizeError::invalid_document("intent", e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read intent: {}", path.display()))?;
        Ok(Self::parse(&content)?)
    }
}

/// Rich description of one category value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryExpansion {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub synonyms: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub examples: Vec<String>,
}

/// Expansion records keyed by dimension type, then category name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expansions(BTreeMap<String, BTreeMap<String, CategoryExpansion>>);

impl Expansions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> CategorizeResult<Self> {
        let value = parse_llm_json(raw, "expansions")?;
        serde_json::from_value(value)
            .map_err(|e| CategorizeError::invalid_document("expansions", e.to_string()))
    }

    /// Load a combined `{dimension: {category: expansion}}` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read expansions: {}", path.display()))?;
        Ok(Self::parse(&content)?)
    }

    /// Load a single-dimension `{category: expansion}` file
    pub fn load_dimension(&mut self, dimension_type: &str, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read expansion: {}", path.display()))?;
        let value = parse_llm_json(&content, "expansion")?;
        let categories: BTreeMap<String, CategoryExpansion> = serde_json::from_value(value)
            .map_err(|e| CategorizeError::invalid_document("expansion", e.to_string()))?;
        self.insert_dimension(dimension_type, categories);
        Ok(())
    }

    pub fn insert_dimension(
        &mut self,
        dimension_type: &str,
        categories: BTreeMap<String, CategoryExpansion>,
    ) {
        self.0.insert(dimension_type.to_string(), categories);
    }

    pub fn dimension(&self, dimension_type: &str) -> Option<&BTreeMap<String, CategoryExpansion>> {
        self.0.get(dimension_type)
    }

    pub fn get(&self, dimension_type: &str, category: &str) -> Option<&CategoryExpansion> {
        self.0.get(dimension_type).and_then(|cats| cats.get(category))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write expansions: {}", path.display()))
    }
}
