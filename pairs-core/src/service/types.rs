use chrono::NaiveDate;
use pairs_common::SignalSeries;
use serde::Serialize;

use crate::analysis::{CointegrationResult, FeatureFrame, HedgeModel};
use crate::backtest::BacktestResult;

/// The aligned window a run was evaluated on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairSummary {
    pub symbol_a: String,
    pub symbol_b: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Dates present for both symbols
    pub observations: usize,
}

/// Everything produced for a cointegrated pair
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub pair: PairSummary,
    pub cointegration: CointegrationResult,
    pub hedge: HedgeModel,
    /// Days for a spread deviation to halve, when the spread mean-reverts
    pub half_life: Option<f64>,
    pub features: FeatureFrame,
    pub signals: SignalSeries,
    pub backtest: Option<BacktestResult>,
}

/// Result of a pipeline run.
///
/// A pair that fails the cointegration test stops the run before the
/// spread is built. That is an expected outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    NotCointegrated {
        pair: PairSummary,
        cointegration: CointegrationResult,
    },
    Completed(Box<PipelineReport>),
}

impl PipelineOutcome {
    pub fn pair(&self) -> &PairSummary {
        match self {
            PipelineOutcome::NotCointegrated { pair, .. } => pair,
            PipelineOutcome::Completed(report) => &report.pair,
        }
    }

    pub fn cointegration(&self) -> &CointegrationResult {
        match self {
            PipelineOutcome::NotCointegrated { cointegration, .. } => cointegration,
            PipelineOutcome::Completed(report) => &report.cointegration,
        }
    }

    pub fn is_cointegrated(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            PipelineOutcome::Completed(report) => Some(report),
            PipelineOutcome::NotCointegrated { .. } => None,
        }
    }
}
