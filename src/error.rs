//! Error types for simout-metrics

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the master roster
#[derive(Debug, Error)]
pub enum RosterLoadError {
    #[error("Roster file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Roster file is empty: {}", path.display())]
    Empty { path: PathBuf },

    #[error("Failed to parse roster {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Roster {} is missing columns: {}", path.display(), columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("I/O error reading roster: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading a single trial time series
#[derive(Debug, Error)]
pub enum TrialLoadError {
    #[error("No trial file name was given")]
    MissingFileName,

    #[error("Trial file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to parse trial file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Trial file {} is missing columns: {}", path.display(), columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("Invalid number '{value}' in {} row {row}, column {column}", path.display())]
    InvalidNumber {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
    },

    #[error(
        "Trial file {} has {count} samples, at least 2 are needed to derive dt",
        path.display()
    )]
    InsufficientSamples { path: PathBuf, count: usize },

    #[error("Trial file {} has a non-positive sample interval dt={dt}", path.display())]
    NonPositiveInterval { path: PathBuf, dt: f64 },

    #[error("I/O error reading trial file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a subject or cohort run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    RosterLoad(#[from] RosterLoadError),

    #[error(transparent)]
    TrialLoad(#[from] TrialLoadError),

    #[error("Subject {subject} has no experiment date, cannot name its result file")]
    MissingExperimentDate { subject: String },

    #[error("Subject {subject} has experiment date '{date}', expected digits only")]
    InvalidExperimentDate { subject: String, date: String },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Write {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Read {
            path: path.into(),
            source,
        }
    }
}
