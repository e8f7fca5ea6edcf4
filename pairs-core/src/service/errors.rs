use pairs_common::DataError;
use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::backtest::BacktestError;
use crate::provider::ProviderError;

/// Pipeline layer error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Backtest error: {0}")]
    Backtest(#[from] BacktestError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Provider returned nothing usable or could not be reached
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            PipelineError::Provider(_) => true,
            PipelineError::Data(_) => true,
            PipelineError::Analysis(AnalysisError::DataUnavailable(_)) => true,
            PipelineError::Analysis(AnalysisError::InsufficientData { .. }) => true,
            PipelineError::Analysis(_) => false,
            PipelineError::Backtest(_) => false,
            PipelineError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_unavailable_classification() {
        let err: PipelineError = ProviderError::UnknownSymbol("ZZZZ".into()).into();
        assert!(err.is_data_unavailable());

        let err: PipelineError = AnalysisError::InsufficientData {
            required: 30,
            actual: 12,
        }
        .into();
        assert!(err.is_data_unavailable());

        let err: PipelineError = AnalysisError::InvalidThreshold { entry: 0.5, exit: 2.0 }.into();
        assert!(!err.is_data_unavailable());

        let err: PipelineError = BacktestError::EmptyInput.into();
        assert!(!err.is_data_unavailable());
    }
}
