//! Error types for indexing and fitting

use thiserror::Error;

use crate::sweep::RunId;

/// Errors raised while fitting a single time series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("unsupported growth model: {0:?} (supported: \"classic\")")]
    UnsupportedModel(String),

    #[error("insufficient data: {usable} usable sample(s) in fitting window, need at least 2")]
    InsufficientData { usable: usize },

    #[error("fitting range must be positive and finite, got {0}")]
    InvalidFittingRange(f64),

    #[error("run {0} appears more than once in the sweep")]
    DuplicateRun(RunId),

    #[error("invalid time series: {0}")]
    InvalidSeries(String),

    #[error("least-squares solve failed: {0}")]
    Solver(String),
}

/// Errors raised while indexing a sweep or preparing an analysis.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("run {run} has no value for parameter {parameter:?}")]
    MissingParameter { run: RunId, parameter: String },

    #[error("run {0} appears more than once in the sweep")]
    DuplicateRun(RunId),

    #[error("parameter {parameter:?} takes {count} distinct values, expected exactly one")]
    AmbiguousParameter { parameter: String, count: usize },

    #[error("value {value} was never observed for parameter {parameter:?}")]
    ValueNotObserved { parameter: String, value: f64 },

    #[error("parameter {0:?} is not part of the index")]
    NotIndexed(String),

    #[error("frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),

    #[error(transparent)]
    Fit(#[from] FitError),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
