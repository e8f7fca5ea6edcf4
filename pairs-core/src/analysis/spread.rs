// =================================================================
// analysis/spread.rs - Hedge Ratio and Spread Construction
// =================================================================

use pairs_common::PriceSeries;
use tracing::debug;

use super::errors::AnalysisError;
use super::stats::{is_constant, ols};
use super::types::{CointegrationResult, HedgeModel, Spread};

/// Fits the hedge ratio of A on B and builds the residual spread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadBuilder;

impl SpreadBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Only valid for a pair the cointegration test accepted.
    pub fn fit(
        &self,
        a: &PriceSeries,
        b: &PriceSeries,
        cointegration: &CointegrationResult,
    ) -> Result<(HedgeModel, Spread), AnalysisError> {
        if !cointegration.is_cointegrated {
            return Err(AnalysisError::Precondition(format!(
                "{}/{} is not cointegrated (p = {:.4} at significance {})",
                a.symbol, b.symbol, cointegration.p_value, cointegration.significance
            )));
        }
        self.fit_unchecked(a, b)
    }

    /// OLS of `a` on `b` with an intercept. The spread omits the intercept.
    pub fn fit_unchecked(&self, a: &PriceSeries, b: &PriceSeries) -> Result<(HedgeModel, Spread), AnalysisError> {
        if a.is_empty() || b.is_empty() {
            return Err(AnalysisError::DataUnavailable(
                "cannot fit a hedge ratio on an empty series".into(),
            ));
        }
        if !a.is_aligned_with(b) {
            return Err(AnalysisError::Precondition(format!(
                "{} and {} are not aligned to common dates",
                a.symbol, b.symbol
            )));
        }

        let (ya, yb) = (a.values(), b.values());
        if is_constant(&yb) {
            return Err(AnalysisError::SingularRegression(format!(
                "{} is constant, the hedge ratio is undetermined",
                b.symbol
            )));
        }

        let fit = ols(&ya, &[&yb], true)?;
        let model = HedgeModel {
            intercept: fit.coefficients[0],
            beta: fit.coefficients[1],
            r_squared: fit.r_squared,
        };

        let spread = Spread {
            dates: a.dates(),
            values: ya
                .iter()
                .zip(&yb)
                .map(|(pa, pb)| pa - model.beta * pb)
                .collect(),
        };

        debug!(
            "Hedge {} on {}: beta={:.6} intercept={:.6} r2={:.4}",
            a.symbol, b.symbol, model.beta, model.intercept, model.r_squared
        );

        Ok((model, spread))
    }
}
