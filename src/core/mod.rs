pub mod config;
pub mod error;
pub mod observation;

pub use config::{ColumnConfig, ModelConfig, PipelineConfig};
pub use error::{CategorizeError, CategorizeResult, OmitReason};
pub use observation::{Observation, ObservationTable, RawTable, Timestamp};
