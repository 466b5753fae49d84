use std::path::PathBuf;

use thiserror::Error;

/// Raised while validating the environment-provided configuration. These are
/// reported once at startup, never per row.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("batch size must be a positive integer, got {0}")]
    InvalidBatchSize(usize),
    #[error("time zone conversion is enabled but INPUT_TIME_ZONE is not set")]
    MissingTimeZone,
    #[error("unknown time zone identifier: {0}")]
    UnknownTimeZone(String),
    #[error("invalid csv delimiter {0:?}: must be a single ascii character other than a quote or line break")]
    InvalidDelimiter(char),
    #[error("explicit datetime format must not be empty")]
    EmptyDatetimeFormat,
}

/// Structural problems with the input file. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("input file {} is empty, expected a header line", .0.display())]
    Empty(PathBuf),
    #[error("header is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),
    #[error("failed to split line {line}: {error}")]
    Malformed { line: usize, error: csv::Error },
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A single field of a raw row could not be converted to its native type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Domain invariants enforced when a trip record is constructed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TripValidationError {
    #[error("dropoff time {dropoff} precedes pickup time {pickup}")]
    DropoffBeforePickup { pickup: String, dropoff: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{field} {local} does not exist in time zone {zone}")]
    NonexistentLocalTime {
        field: &'static str,
        local: String,
        zone: String,
    },
    #[error("invalid store and forward flag: unrecognised value {0:?}")]
    InvalidFlag(String),
    #[error("domain validation failed: {0}")]
    Validation(#[from] TripValidationError),
}

/// Failure to hand a batch to the persistent store. Fatal for the run.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to encode {field} for bulk load: {error}")]
    Encode {
        field: &'static str,
        error: csv::Error,
    },
    #[error("bulk load failed after {attempts} attempt(s): {error}")]
    Database { attempts: u32, error: sqlx::Error },
    #[error("bulk load reported {actual} rows written, expected {expected}")]
    RowCountMismatch { expected: u64, actual: u64 },
}

/// Failure to record a duplicate row. Recovered by the pipeline.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to encode duplicate row: {0}")]
    Encode(#[from] csv::Error),
    #[error("failed to write duplicate row: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("import cancelled")]
    Cancelled,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Load(#[from] LoadError),
}
