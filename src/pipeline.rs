//! Categorization pipeline
//!
//! Stages run strictly in order and each one's output is persisted before
//! the next begins:
//!
//! 1. Embed categories
//! 2. Embed observations
//! 3. Match all dimensions
//! 4. Build assignments
//! 5. Persist assignments (and category stats)
//! 6. Build analytics table from the persisted assignments
//! 7. Persist analytics table (SQLite + CSV)

use anyhow::Result;
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::assign::analytics::{AnalyticsTable, AnalyticsTableBuilder};
use crate::assign::assignment::{AssignmentBuilder, AssignmentRecord, SkippedAssignment};
use crate::assign::store::{self, DEFAULT_TABLE_NAME};
use crate::core::config::PipelineConfig;
use crate::core::error::{CategorizeError, CategorizeResult};
use crate::core::observation::{ObservationTable, RawTable};
use crate::embedding::categories::{CategoryEmbeddings, DimensionEmbedder, SkippedCategory};
use crate::embedding::documents::{Expansions, IntentDocument};
use crate::embedding::embedder::{embed_texts, Embedder};
use crate::matching::matcher::Matcher;
use crate::matching::multi::{MultiDimensionMatcher, MultiMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    EmbedCategories,
    EmbedObservations,
    MatchDimensions,
    BuildAssignments,
    PersistAssignments,
    BuildAnalytics,
    PersistAnalytics,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::EmbedCategories,
        Stage::EmbedObservations,
        Stage::MatchDimensions,
        Stage::BuildAssignments,
        Stage::PersistAssignments,
        Stage::BuildAnalytics,
        Stage::PersistAnalytics,
    ];

    pub fn number(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0) + 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::EmbedCategories => "embed categories",
            Stage::EmbedObservations => "embed observations",
            Stage::MatchDimensions => "match all dimensions",
            Stage::BuildAssignments => "build assignments",
            Stage::PersistAssignments => "persist assignments",
            Stage::BuildAnalytics => "build analytics table",
            Stage::PersistAnalytics => "persist analytics table",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.number(), Self::ALL.len(), self.name())
    }
}

fn enter(stage: Stage) {
    info!(stage = %stage, "starting stage");
}

/// Run id derived from the local clock
pub fn default_run_id() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Files written by one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    pub assignments: PathBuf,
    pub category_stats: PathBuf,
    pub analytics_db: PathBuf,
    pub analytics_csv: PathBuf,
}

impl RunArtifacts {
    pub fn new(output_dir: &Path, run_id: &str) -> Self {
        Self {
            assignments: output_dir.join(format!("assignments_{}.json", run_id)),
            category_stats: output_dir.join(format!("category_stats_{}.json", run_id)),
            analytics_db: output_dir.join(format!("analytics_{}.db", run_id)),
            analytics_csv: output_dir.join(format!("analytics_{}.csv", run_id)),
        }
    }
}

/// In-memory result of stages 1-4
#[derive(Debug, Clone)]
pub struct Categorization {
    pub observations: ObservationTable,
    pub category_embeddings: CategoryEmbeddings,
    pub matches: MultiMatch,
    pub records: Vec<AssignmentRecord>,
    pub skipped_categories: Vec<SkippedCategory>,
    pub skipped_assignments: Vec<SkippedAssignment>,
}

/// Everything produced by a full run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: String,
    pub artifacts: RunArtifacts,
    pub categorization: Categorization,
    pub table: AnalyticsTable,
}

/// Orchestrates the categorization stages for one embedder and config
pub struct Pipeline<'a> {
    config: PipelineConfig,
    embedder: &'a dyn Embedder,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig, embedder: &'a dyn Embedder) -> Self {
        Self { config, embedder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn matcher(&self) -> Matcher {
        Matcher::new(
            self.config.similarity_threshold,
            self.config.min_support_ratio,
        )
    }

    /// Stages 1-4: embed, match and build assignment records in memory.
    ///
    /// Missing columns and a missing expansions document fail before any
    /// embedding work.
    pub fn categorize(
        &self,
        dataset: &RawTable,
        intent: &IntentDocument,
        expansions: Option<&Expansions>,
    ) -> CategorizeResult<Categorization> {
        self.config.validate()?;
        let observations = ObservationTable::from_raw(dataset, &self.config.columns)?;
        let expansions = expansions.ok_or(CategorizeError::MissingExpansions)?;

        info!(
            rows = observations.len(),
            dimensions = intent.group_by.len(),
            model = self.embedder.name(),
            "categorization started"
        );

        enter(Stage::EmbedCategories);
        let (category_embeddings, skipped_categories) = DimensionEmbedder::new(self.embedder)
            .with_batch_size(self.config.batch_size)
            .embed_categories(intent, Some(expansions))?;

        enter(Stage::EmbedObservations);
        let observation_embeddings = embed_texts(
            self.embedder,
            &observations.texts_for_embedding(),
            self.config.batch_size,
        )?;

        enter(Stage::MatchDimensions);
        let matches = MultiDimensionMatcher::new(self.matcher())
            .match_all(&category_embeddings, &observation_embeddings)?;

        enter(Stage::BuildAssignments);
        let output = AssignmentBuilder::new()
            .with_max_examples(self.config.max_examples)
            .build(&observations, &matches);

        Ok(Categorization {
            observations,
            category_embeddings,
            matches,
            records: output.records,
            skipped_categories,
            skipped_assignments: output.skipped,
        })
    }

    /// Full run: every stage, persisting artifacts under the output directory
    pub fn run(
        &self,
        dataset: &RawTable,
        intent: &IntentDocument,
        expansions: Option<&Expansions>,
        run_id: &str,
    ) -> Result<PipelineRun> {
        let artifacts = RunArtifacts::new(&self.config.output_dir, run_id);
        let categorization = self.categorize(dataset, intent, expansions)?;

        enter(Stage::PersistAssignments);
        store::save_assignments(&categorization.records, &artifacts.assignments)?;
        store::save_category_stats(&categorization.matches.stats(), &artifacts.category_stats)?;

        let table = build_analytics(&artifacts.assignments, &artifacts)?;

        info!(
            run_id,
            records = categorization.records.len(),
            output = %self.config.output_dir.display(),
            "pipeline completed"
        );

        Ok(PipelineRun {
            run_id: run_id.to_string(),
            artifacts,
            categorization,
            table,
        })
    }
}

/// Stages 6-7 from a persisted assignment file
pub fn build_analytics(assignments_path: &Path, artifacts: &RunArtifacts) -> Result<AnalyticsTable> {
    enter(Stage::BuildAnalytics);
    let records = store::load_assignments(assignments_path)?;
    let table = AnalyticsTableBuilder::new().build(&records);

    enter(Stage::PersistAnalytics);
    store::save_to_sqlite(&table, &artifacts.analytics_db, DEFAULT_TABLE_NAME)?;
    store::save_to_csv(&table, &artifacts.analytics_csv)?;

    Ok(table)
}
