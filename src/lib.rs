//! simout-metrics - Trial metrics and cohort summaries for driving-simulator logs
//!
//! Raw simulator recordings are reduced to one summary row per trial through a
//! sequential pipeline: master roster → subject → trial → metric calculation →
//! subject and cohort CSV files.
//!
//! ## Modules
//!
//! - **Roster**: Load the subject master roster and normalize absent cells
//! - **Trial / Metrics**: Load one recording and compute its kinematic metrics
//! - **Subject / Pipeline**: Run a subject's trials and the whole cohort

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod roster;
pub mod schema;
pub mod series;
pub mod subject;
pub mod summary;
pub mod trial;
pub mod types;

pub use config::{Config, FailurePolicy, PathConfig, TrialSource, VehicleGeometry};
pub use error::{PipelineError, RosterLoadError, TrialLoadError};
pub use metrics::{MetricCalculator, PedalIntegrals};
pub use pipeline::{DataManager, RunReport, SubjectFailure};
pub use report::{Level, MemoryLog, RunLog, TracingLog};
pub use roster::{validate_roster, RosterReader, RosterRecord};
pub use series::TrialSeries;
pub use subject::SubjectProcessor;
pub use summary::{CohortSummary, SubjectSummary, TrialSummary};
pub use trial::{TrialFileName, TrialProcessor};
pub use types::{NominalSpeed, OrderSlot, SubjectId, ValidationWarning};

// Schema exports
pub use schema::{ColumnSchema, ProcessedSchema, ResultSchema, RosterSchema, SimoutSchema};

/// Crate version recorded in run reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in run reports
pub const PRODUCER_NAME: &str = "simout-metrics";
