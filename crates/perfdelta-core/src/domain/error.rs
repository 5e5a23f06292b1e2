//! Domain-level error taxonomy for perfdelta.

/// Errors produced when constructing domain values from untrusted input.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("time elapsed must be a finite, non-negative number of seconds, got {0}")]
    InvalidTimeElapsed(f64),

    #[error("test name must not be empty")]
    EmptyTestName,

    #[error("a test series needs at least one record")]
    EmptySeries,

    #[error("series for {expected} contains a record for {found}")]
    MixedSeries { expected: String, found: String },

    #[error("threshold {name} must be finite and non-negative, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("invocation count must be at least 1")]
    ZeroInvocations,
}

/// perfdelta domain errors.
#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("git error: {0}")]
    GitError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no result files found in {0}")]
    NoResults(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for perfdelta domain operations.
pub type Result<T> = std::result::Result<T, PerfError>;
