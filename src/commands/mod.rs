pub mod analytics;
pub mod categorize;
pub mod insights;
pub mod model;
pub mod stats;
