//! Assignment records and analytics tables
//!
//! - `assignment`: per-row category assignments
//! - `analytics`: wide table with derived date features
//! - `store`: JSON, SQLite and CSV persistence

pub mod analytics;
pub mod assignment;
pub mod store;

pub use analytics::{AnalyticsRow, AnalyticsTable, AnalyticsTableBuilder, CellValue};
pub use assignment::{
    AssignmentBuilder, AssignmentOutput, AssignmentRecord, CategoryAssignments, SkippedAssignment,
};
