// =================================================================
// provider/errors.rs - Error Types
// =================================================================

use chrono::NaiveDate;
use pairs_common::DataError;
use thiserror::Error;

/// Error types for market data providers
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Provider API error: {0}")]
    ApiError(String),

    #[error("Empty date range: {start} is after {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("No data returned for {0}")]
    NoData(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl ProviderError {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::NetworkError(_) | ProviderError::Timeout)
    }
}

// Convert from common error types
impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}

impl From<csv::Error> for ProviderError {
    fn from(err: csv::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() || err.is_request() {
            ProviderError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ProviderError::ParseError(err.to_string())
        } else {
            ProviderError::ApiError(err.to_string())
        }
    }
}
