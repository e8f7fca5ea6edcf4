// =================================================================
// analysis/errors.rs - Error Types
// =================================================================

use thiserror::Error;

/// Errors raised by the analysis stages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Insufficient data: {required} observations required, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Singular regression: {0}")]
    SingularRegression(String),

    #[error("Invalid thresholds: entry ({entry}) must exceed exit ({exit}) and exit must be positive")]
    InvalidThreshold { entry: f64, exit: f64 },

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: String, reason: String },
}

impl From<ta::errors::TaError> for AnalysisError {
    fn from(err: ta::errors::TaError) -> Self {
        AnalysisError::InvalidParameter {
            field: "window".to_string(),
            reason: format!("{:?}", err),
        }
    }
}
