//! Error taxonomy for the ingestion and forecasting pipeline.

use thiserror::Error;

/// Pipeline errors surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// The uploaded stream could not be read as a delimited text table
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Missing, duplicate or mismatched columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Out-of-range parameters or insufficient history
    #[error("Validation error: {0}")]
    Validation(String),

    /// An operation was invoked out of sequence
    #[error("State error: {0}")]
    State(String),

    /// An external data service could not be reached or answered badly.
    /// Fetchers swallow this and return an empty table instead.
    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    /// The regression engine failed to fit or predict
    #[error("Model error: {0}")]
    Model(String),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::MalformedInput(err.to_string())
    }
}
