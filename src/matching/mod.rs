//! Category matching
//!
//! - `matcher`: threshold + support filtering for one dimension
//! - `multi`: independent matching over every dimension

pub mod matcher;
pub mod multi;

pub use matcher::{CategoryStats, DimensionMatch, DroppedCategory, Matcher};
pub use multi::{DimensionStats, MultiDimensionMatcher, MultiMatch};
