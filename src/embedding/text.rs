//! Canonical category text
//!
//! The string embedded for a category is built from its expansion record,
//! never from the bare name.

use super::documents::CategoryExpansion;

/// Build the text embedded for one category.
///
/// Layout: `Category: {name}. Description: {description}. Synonyms: {a, b}. Examples: {x | y}.`
pub fn build_category_text(expansion: &CategoryExpansion) -> String {
    format!(
        "Category: {}. Description: {}. Synonyms: {}. Examples: {}.",
        expansion.name,
        expansion.description,
        expansion.synonyms.join(", "),
        expansion.examples.join(" | "),
    )
    .trim()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_expansion() {
        let exp = CategoryExpansion {
            name: "near_miss".to_string(),
            description: "An event that could have caused harm".to_string(),
            synonyms: vec!["close call".to_string(), "narrow escape".to_string()],
            examples: vec![
                "forklift almost hit worker".to_string(),
                "tool dropped from height".to_string(),
            ],
        };

        assert_eq!(
            build_category_text(&exp),
            "Category: near_miss. Description: An event that could have caused harm. \
             Synonyms: close call, narrow escape. \
             Examples: forklift almost hit worker | tool dropped from height."
        );
    }

    #[test]
    fn test_missing_fields_default_empty() {
        let exp: CategoryExpansion = serde_json::from_str(r#"{"name": "office"}"#).unwrap();
        assert_eq!(
            build_category_text(&exp),
            "Category: office. Description: . Synonyms: . Examples: ."
        );
    }

    #[test]
    fn test_deterministic() {
        let exp = CategoryExpansion {
            name: "warehouse".to_string(),
            ..Default::default()
        };
        assert_eq!(build_category_text(&exp), build_category_text(&exp));
    }
}
