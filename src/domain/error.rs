//! Application error types with proper error chaining.

use thiserror::Error;

/// Instrument registration failures.
///
/// These are programmer errors raised while the application bootstraps its
/// instruments; they must stop the service from starting.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Metric '{name}' already registered with labels {existing:?}, requested {requested:?}")]
    DuplicateMetric {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },
    #[error("Metric '{name}' already registered as a {existing}")]
    KindMismatch { name: String, existing: &'static str },
    #[error("Metric '{name}' already registered with buckets {existing:?}")]
    BucketMismatch { name: String, existing: Vec<f64> },
    #[error("Invalid metric name: '{0}'")]
    InvalidMetricName(String),
    #[error("Invalid label name '{label}' for metric '{name}'")]
    InvalidLabelName { name: String, label: String },
    #[error("Duplicate label name '{label}' for metric '{name}'")]
    DuplicateLabelName { name: String, label: String },
    #[error("Invalid buckets for metric '{name}': {message}")]
    InvalidBuckets { name: String, message: String },
    #[error("Metric '{name}' rejected by the registry: {message}")]
    Rejected { name: String, message: String },
}

/// Failures recording a single observation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObservationError {
    #[error("Label mismatch for metric '{name}': expected {expected:?}, got {actual:?}")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("Invalid value for metric '{name}': {value}")]
    InvalidValue { name: String, value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors a handler can return; each maps to a JSON error response.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
