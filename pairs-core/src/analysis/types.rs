// =================================================================
// analysis/types.rs - Analysis Stage Outputs
// =================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::stats::ols;

/// Finite-sample critical values of the cointegration statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

/// Outcome of the Engle-Granger test for one aligned pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationResult {
    /// ADF t-statistic of the first-step residuals
    pub statistic: f64,
    /// Asymptotic p-value in [0, 1]
    pub p_value: f64,
    pub is_cointegrated: bool,
    pub significance: f64,
    pub critical_values: CriticalValues,
    /// Lagged differences chosen for the residual ADF regression
    pub lags_used: usize,
    /// Aligned observations the test was run on
    pub observations: usize,
}

/// Hedge ratio of A on B fitted with an intercept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeModel {
    pub beta: f64,
    /// Reported only; the spread itself carries no intercept
    pub intercept: f64,
    pub r_squared: f64,
}

/// `log A - beta * log B` on the aligned dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub(crate) dates: Vec<NaiveDate>,
    pub(crate) values: Vec<f64>,
}

impl Spread {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean-reversion half-life in observations.
    ///
    /// Fits `ds_t = c + lambda * s_{t-1}` and returns `-ln 2 / lambda`.
    /// `None` when the spread does not revert (`lambda >= 0`) or is too
    /// short to fit.
    pub fn half_life(&self) -> Option<f64> {
        if self.values.len() < 3 {
            return None;
        }
        let lagged = &self.values[..self.values.len() - 1];
        let diffs: Vec<f64> = self.values.windows(2).map(|w| w[1] - w[0]).collect();
        let fit = ols(&diffs, &[lagged], true).ok()?;
        let lambda = fit.coefficients[1];
        (lambda < 0.0).then(|| -std::f64::consts::LN_2 / lambda)
    }
}

/// One fully defined row of derived features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub log_price_a: f64,
    pub log_price_b: f64,
    pub price_ma_a: f64,
    pub price_ma_b: f64,
    pub spread: f64,
    pub spread_ma: f64,
    pub z_score: f64,
    pub z_score_ma: f64,
    pub log_return_a: f64,
    pub log_return_b: f64,
    pub volatility_a: f64,
    pub volatility_b: f64,
    pub spread_roc: f64,
    pub volume_a: u64,
    pub volume_b: u64,
}

/// Feature rows on the usable date range of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    pub symbol_a: String,
    pub symbol_b: String,
    pub window: usize,
    pub ma_window: usize,
    pub rows: Vec<FeatureRow>,
    /// Rows dropped before the first fully defined row
    pub leading_dropped: usize,
    /// All dropped rows, including gaps after the warm-up
    pub total_dropped: usize,
}

impl FeatureFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn z_scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.z_score).collect()
    }

    /// `(date, log price of A)` for every row, as consumed by the backtest.
    pub fn log_prices_a(&self) -> Vec<(NaiveDate, f64)> {
        self.rows.iter().map(|r| (r.date, r.log_price_a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread_from(values: Vec<f64>) -> Spread {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        Spread {
            dates: (0..values.len())
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            values,
        }
    }

    #[test]
    fn test_half_life_of_ar1_process() {
        // s_t = 0.5 s_{t-1} + shock keeps lambda near -0.5
        let mut values = vec![1.0];
        let mut seed = 17u64;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let shock = ((seed >> 33) as f64 / (1u64 << 31) as f64 - 0.5) * 0.1;
            let last = *values.last().unwrap();
            values.push(0.5 * last + shock);
        }
        let half_life = spread_from(values).half_life().unwrap();
        let expected = -std::f64::consts::LN_2 / -0.5;
        assert!((half_life - expected).abs() < 0.3, "half life {}", half_life);
    }

    #[test]
    fn test_half_life_none_for_trending_spread() {
        let values: Vec<f64> = (0..50).map(|i| 1.05f64.powi(i)).collect();
        assert_eq!(spread_from(values).half_life(), None);
    }

    #[test]
    fn test_half_life_none_for_short_spread() {
        assert_eq!(spread_from(vec![1.0, 2.0]).half_life(), None);
    }
}
