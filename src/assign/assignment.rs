//! Assignment records
//!
//! Joins each row's best category per dimension back onto the row's dates.
//! Dimensions without a usable assignment are left out of the record, never
//! written as null.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::warn;

use crate::core::error::OmitReason;
use crate::core::observation::{format_iso, ObservationTable};
use crate::matching::multi::MultiMatch;

/// `dimension_type -> category` in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryAssignments(Vec<(String, String)>);

impl CategoryAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the category of a dimension, keeping its original position
    pub fn insert(&mut self, dimension_type: impl Into<String>, category: impl Into<String>) {
        let dimension_type = dimension_type.into();
        let category = category.into();
        match self.0.iter_mut().find(|(d, _)| *d == dimension_type) {
            Some(entry) => entry.1 = category,
            None => self.0.push((dimension_type, category)),
        }
    }

    pub fn get(&self, dimension_type: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(d, _)| d == dimension_type)
            .map(|(_, c)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(d, c)| (d.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CategoryAssignments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (dimension, category) in &self.0 {
            map.serialize_entry(dimension, category)?;
        }
        map.end()
    }
}

struct AssignmentsVisitor;

impl<'de> Visitor<'de> for AssignmentsVisitor {
    type Value = CategoryAssignments;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of dimension type to category name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = CategoryAssignments::new();
        while let Some((dimension, category)) = access.next_entry::<String, Option<String>>()? {
            // Tolerate nulls written by other producers
            if let Some(category) = category {
                out.insert(dimension, category);
            }
        }
        Ok(out)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(CategoryAssignments::new())
    }
}

impl<'de> Deserialize<'de> for CategoryAssignments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AssignmentsVisitor)
    }
}

/// One exported row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub row_index: usize,
    pub observation_date: Option<String>,
    pub processed_date: Option<String>,
    #[serde(default)]
    pub assignments: CategoryAssignments,
}

/// A dimension left out of a record because its index did not resolve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAssignment {
    pub row_index: usize,
    pub dimension_type: String,
    pub reason: OmitReason,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentOutput {
    pub records: Vec<AssignmentRecord>,
    pub skipped: Vec<SkippedAssignment>,
}

/// Builds assignment records from match results
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentBuilder {
    max_examples: Option<usize>,
}

impl AssignmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export at most `max_examples` rows
    pub fn with_max_examples(mut self, max_examples: Option<usize>) -> Self {
        self.max_examples = max_examples;
        self
    }

    pub fn build(&self, observations: &ObservationTable, matches: &MultiMatch) -> AssignmentOutput {
        let n_rows = match self.max_examples {
            Some(cap) => observations.len().min(cap),
            None => observations.len(),
        };

        let mut output = AssignmentOutput::default();

        for (i, obs) in observations.iter().take(n_rows).enumerate() {
            let mut assignments = CategoryAssignments::new();

            for dim in matches.iter() {
                let resolved = match dim.best.get(i) {
                    None => Err(OmitReason::IndexOutOfRange),
                    Some(None) => Err(OmitReason::NoAssignment),
                    Some(Some(ci)) => dim
                        .categories
                        .get(*ci)
                        .ok_or(OmitReason::IndexOutOfRange),
                };

                match resolved {
                    Ok(category) => assignments.insert(dim.dimension_type.as_str(), category.as_str()),
                    Err(OmitReason::NoAssignment) => {}
                    Err(reason) => {
                        warn!(
                            row = i,
                            dimension = dim.dimension_type.as_str(),
                            %reason,
                            "skipping assignment"
                        );
                        output.skipped.push(SkippedAssignment {
                            row_index: i,
                            dimension_type: dim.dimension_type.clone(),
                            reason,
                        });
                    }
                }
            }

            output.records.push(AssignmentRecord {
                row_index: i,
                observation_date: obs.observation_date.as_ref().map(format_iso),
                processed_date: obs.processed_date.as_ref().map(format_iso),
                assignments,
            });
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observation::{parse_datetime, Observation};
    use crate::matching::matcher::DimensionMatch;

    fn table(n: usize) -> ObservationTable {
        ObservationTable::new(
            (0..n)
                .map(|i| Observation {
                    title: Some(format!("row {}", i)),
                    observation_date: parse_datetime("2024-01-01"),
                    processed_date: if i == 0 { None } else { parse_datetime("2024-01-03") },
                    ..Default::default()
                })
                .collect(),
        )
    }

    fn dim(name: &str, categories: &[&str], best: Vec<Option<usize>>) -> DimensionMatch {
        DimensionMatch {
            dimension_type: name.to_string(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            best,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_records() {
        let matches = MultiMatch::new(vec![
            dim("OBSERVATION_TYPE", &["hazard", "near_miss"], vec![Some(1), None, Some(0)]),
            dim("LOCATION", &["office"], vec![Some(0), Some(0), None]),
        ]);

        let out = AssignmentBuilder::new().build(&table(3), &matches);
        assert_eq!(out.records.len(), 3);
        assert!(out.skipped.is_empty());

        let r0 = &out.records[0];
        assert_eq!(r0.row_index, 0);
        assert_eq!(r0.observation_date.as_deref(), Some("2024-01-01T00:00:00"));
        assert_eq!(r0.processed_date, None);
        let dims: Vec<_> = r0.assignments.iter().collect();
        // order follows the match order, not alphabetical
        assert_eq!(
            dims,
            vec![("OBSERVATION_TYPE", "near_miss"), ("LOCATION", "office")]
        );

        assert_eq!(out.records[1].assignments.get("OBSERVATION_TYPE"), None);
        assert_eq!(out.records[2].assignments.len(), 1);
    }

    #[test]
    fn test_out_of_range_indices_are_skipped() {
        let matches = MultiMatch::new(vec![
            dim("SHORT", &["a"], vec![Some(0)]),
            dim("BAD", &["a"], vec![Some(5), Some(0)]),
        ]);

        let out = AssignmentBuilder::new().build(&table(2), &matches);
        assert_eq!(out.records[0].assignments.get("SHORT"), Some("a"));
        assert_eq!(out.records[0].assignments.get("BAD"), None);
        assert_eq!(out.records[1].assignments.get("SHORT"), None);
        assert_eq!(out.records[1].assignments.get("BAD"), Some("a"));

        assert_eq!(out.skipped.len(), 2);
        assert!(out
            .skipped
            .iter()
            .all(|s| s.reason == OmitReason::IndexOutOfRange));
    }

    #[test]
    fn test_max_examples_caps_rows() {
        let matches = MultiMatch::new(vec![dim("D", &["a"], vec![Some(0); 5])]);
        let out = AssignmentBuilder::new()
            .with_max_examples(Some(2))
            .build(&table(5), &matches);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.records[1].row_index, 1);
    }

    #[test]
    fn test_record_json_shape() {
        let mut assignments = CategoryAssignments::new();
        assignments.insert("OBSERVATION_TYPE", "near_miss");
        assignments.insert("LOCATION", "office");
        let record = AssignmentRecord {
            row_index: 3,
            observation_date: Some("2024-01-01T00:00:00".to_string()),
            processed_date: None,
            assignments,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"row_index":3,"observation_date":"2024-01-01T00:00:00","processed_date":null,"assignments":{"OBSERVATION_TYPE":"near_miss","LOCATION":"office"}}"#
        );

        let back: AssignmentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_null_assignments_tolerated() {
        let record: AssignmentRecord = serde_json::from_str(
            r#"{"row_index":0,"observation_date":null,"processed_date":null,"assignments":{"A":null,"B":"x"}}"#,
        )
        .unwrap();
        assert_eq!(record.assignments.len(), 1);

        let record: AssignmentRecord = serde_json::from_str(
            r#"{"row_index":0,"observation_date":null,"processed_date":null,"assignments":null}"#,
        )
        .unwrap();
        assert!(record.assignments.is_empty());
    }
}
