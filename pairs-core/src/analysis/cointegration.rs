// =================================================================
// analysis/cointegration.rs - Engle-Granger Cointegration Test
// =================================================================

use pairs_common::PriceSeries;
use tracing::{debug, warn};

use super::errors::AnalysisError;
use super::stats::{is_constant, norm_cdf, ols, OlsFit};
use super::types::{CointegrationResult, CriticalValues};

pub const DEFAULT_SIGNIFICANCE: f64 = 0.01;
pub const DEFAULT_MIN_OBSERVATIONS: usize = 30;

// MacKinnon (1994) response surface, constant term, two variables
const TAU_MAX: f64 = 0.92;
const TAU_MIN: f64 = -18.86;
const TAU_STAR: f64 = -2.62;
const TAU_SMALL_P: [f64; 3] = [2.92, 1.5012, 0.039796];
const TAU_LARGE_P: [f64; 4] = [2.1945, 0.64695, -0.29198, -0.042377];

// MacKinnon (2010) finite-sample critical values, constant term, two variables
const TAU_CRIT_1: [f64; 3] = [-3.89644, -10.9519, -22.527];
const TAU_CRIT_5: [f64; 3] = [-3.33613, -6.1101, -6.823];
const TAU_CRIT_10: [f64; 3] = [-3.04445, -4.2412, -2.720];

/// Classifies an aligned pair of log-price series as cointegrated or not.
///
/// Two-step procedure: regress A on B with an intercept, then run an
/// augmented Dickey-Fuller regression without deterministic terms on the
/// residuals, choosing the lag order by AIC.
#[derive(Debug, Clone)]
pub struct CointegrationTester {
    significance: f64,
    min_observations: usize,
    max_lag: Option<usize>,
}

impl CointegrationTester {
    pub fn new(significance: f64) -> Result<Self, AnalysisError> {
        if !(significance > 0.0 && significance < 1.0) {
            return Err(AnalysisError::InvalidParameter {
                field: "significance".into(),
                reason: format!("must lie strictly between 0 and 1, got {}", significance),
            });
        }
        Ok(Self {
            significance,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            max_lag: None,
        })
    }

    pub fn with_min_observations(mut self, min_observations: usize) -> Self {
        self.min_observations = min_observations;
        self
    }

    /// Cap the ADF lag search instead of using the Schwert rule.
    pub fn with_max_lag(mut self, max_lag: Option<usize>) -> Self {
        self.max_lag = max_lag;
        self
    }

    pub fn significance(&self) -> f64 {
        self.significance
    }

    pub fn test(&self, a: &PriceSeries, b: &PriceSeries) -> Result<CointegrationResult, AnalysisError> {
        if a.is_empty() || b.is_empty() {
            let empty = if a.is_empty() { &a.symbol } else { &b.symbol };
            return Err(AnalysisError::DataUnavailable(format!("no prices for {}", empty)));
        }
        if !a.is_aligned_with(b) {
            return Err(AnalysisError::Precondition(format!(
                "{} and {} are not aligned to common dates",
                a.symbol, b.symbol
            )));
        }
        let required = self.min_observations.max(4);
        if a.len() < required {
            return Err(AnalysisError::InsufficientData {
                required,
                actual: a.len(),
            });
        }

        let (ya, yb) = (a.values(), b.values());
        if is_constant(&ya) || is_constant(&yb) {
            return Err(AnalysisError::SingularRegression(format!(
                "{} or {} has a constant price",
                a.symbol, b.symbol
            )));
        }

        let eg = engle_granger(&ya, &yb, self.max_lag)?;
        let p_value = mackinnon_p_value(eg.statistic);
        let result = CointegrationResult {
            statistic: eg.statistic,
            p_value,
            is_cointegrated: p_value < self.significance,
            significance: self.significance,
            critical_values: mackinnon_critical_values(ya.len() - 1),
            lags_used: eg.lags_used,
            observations: ya.len(),
        };

        debug!(
            "Engle-Granger {}/{}: stat={:.4} p={:.4} lags={} n={}",
            a.symbol, b.symbol, result.statistic, result.p_value, result.lags_used, result.observations
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
struct EngleGranger {
    statistic: f64,
    lags_used: usize,
}

fn engle_granger(y0: &[f64], y1: &[f64], max_lag: Option<usize>) -> Result<EngleGranger, AnalysisError> {
    let step_one = ols(y0, &[y1], true)?;

    let threshold = 1.0 - 100.0 * f64::EPSILON.sqrt();
    if step_one.r_squared >= threshold {
        warn!(
            "Cointegrating regression is almost perfect (R2 = {}); reporting an infinite statistic",
            step_one.r_squared
        );
        return Ok(EngleGranger {
            statistic: f64::NEG_INFINITY,
            lags_used: 0,
        });
    }

    let (statistic, lags_used) = adf_no_constant(&step_one.residuals, max_lag)?;
    Ok(EngleGranger { statistic, lags_used })
}

/// ADF t-statistic without deterministic terms, lag order chosen by AIC.
///
/// All candidate lags are fitted on the common sample left after the
/// largest lag; the winner is refitted on its own full sample.
/// Returns the statistic and the selected lag.
pub fn adf_no_constant(x: &[f64], max_lag: Option<usize>) -> Result<(f64, usize), AnalysisError> {
    let n = x.len();
    let limit = (n / 2).checked_sub(1).ok_or(AnalysisError::InsufficientData {
        required: 4,
        actual: n,
    })?;
    let max_lag = match max_lag {
        Some(lag) if lag > limit => {
            return Err(AnalysisError::InvalidParameter {
                field: "max_adf_lag".into(),
                reason: format!("must not exceed {} for {} observations", limit, n),
            })
        }
        Some(lag) => lag,
        None => schwert_max_lag(n).min(limit),
    };

    let diffs: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let aic = adf_regression(x, &diffs, max_lag, lag)?.aic;
        // Strict comparison keeps the smallest lag on ties.
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    let lag = best.map_or(0, |(_, lag)| lag);

    let fit = adf_regression(x, &diffs, lag, lag)?;
    Ok((fit.t_values[0], lag))
}

/// Regress `dx_t` on `x_{t-1}` and `lag` lagged differences, dropping
/// the first `trim` differences from the sample.
fn adf_regression(
    x: &[f64],
    diffs: &[f64],
    trim: usize,
    lag: usize,
) -> Result<OlsFit, AnalysisError> {
    let nobs = diffs.len() - trim;
    let y = &diffs[trim..];
    let mut columns: Vec<&[f64]> = Vec::with_capacity(lag + 1);
    columns.push(&x[trim..trim + nobs]);
    for j in 1..=lag {
        columns.push(&diffs[trim - j..trim - j + nobs]);
    }
    ols(y, &columns, false)
}

/// `ceil(12 * (n / 100)^(1/4))`
fn schwert_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Approximate asymptotic p-value of the Engle-Granger statistic.
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return 1.0;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let poly = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    norm_cdf(poly)
}

/// Critical values at 1, 5 and 10 percent for a sample of `nobs` steps.
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    let at = |c: &[f64; 3]| {
        let inv = 1.0 / nobs as f64;
        c[0] + c[1] * inv + c[2] * inv * inv
    };
    CriticalValues {
        one_pct: at(&TAU_CRIT_1),
        five_pct: at(&TAU_CRIT_5),
        ten_pct: at(&TAU_CRIT_10),
    }
}

/// Evaluate `c[0] + c[1] x + c[2] x^2 + ...`
fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pairs_common::PricePoint;

    struct Lcg(u64);

    impl Lcg {
        fn uniform(&mut self) -> f64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 33) as f64 / (1u64 << 31) as f64 - 0.5
        }
    }

    fn series(symbol: &str, values: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        PriceSeries::new(
            symbol,
            values
                .iter()
                .enumerate()
                .map(|(i, &value)| PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    value,
                })
                .collect(),
        )
        .unwrap()
    }

    fn random_walk(rng: &mut Lcg, n: usize, start: f64, step: f64) -> Vec<f64> {
        let mut out = Vec::with_capacity(n);
        let mut level = start;
        for _ in 0..n {
            level += rng.uniform() * step;
            out.push(level);
        }
        out
    }

    fn cointegrated_pair(n: usize) -> (PriceSeries, PriceSeries) {
        let mut rng = Lcg(42);
        let b = random_walk(&mut rng, n, 4.0, 0.04);
        let a: Vec<f64> = b.iter().map(|v| 0.3 + 1.2 * v + rng.uniform() * 0.02).collect();
        (series("A", &a), series("B", &b))
    }

    #[test]
    fn test_cointegrated_pair_detected() {
        let (a, b) = cointegrated_pair(400);
        let result = CointegrationTester::new(0.01).unwrap().test(&a, &b).unwrap();
        assert!(result.statistic < result.critical_values.one_pct);
        assert!(result.p_value < 0.01, "p = {}", result.p_value);
        assert!(result.is_cointegrated);
        assert_eq!(result.observations, 400);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn test_independent_random_walks_rejected() {
        let mut rng = Lcg(7);
        let a = random_walk(&mut rng, 400, 4.0, 0.04);
        let b = random_walk(&mut rng, 400, 3.0, 0.04);
        let result = CointegrationTester::new(0.01)
            .unwrap()
            .test(&series("A", &a), &series("B", &b))
            .unwrap();
        assert!(!result.is_cointegrated, "p = {}", result.p_value);
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn test_rerun_is_bit_identical() {
        let (a, b) = cointegrated_pair(250);
        let tester = CointegrationTester::new(0.05).unwrap();
        let first = tester.test(&a, &b).unwrap();
        let second = tester.test(&a, &b).unwrap();
        assert_eq!(first.statistic.to_bits(), second.statistic.to_bits());
        assert_eq!(first.p_value.to_bits(), second.p_value.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_series_is_data_unavailable() {
        let empty = series("A", &[]);
        let b = series("B", &[1.0, 2.0]);
        let err = CointegrationTester::new(0.01).unwrap().test(&empty, &b).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
    }

    #[test]
    fn test_short_series_is_insufficient() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let err = CointegrationTester::new(0.01)
            .unwrap()
            .test(&series("A", &values), &series("B", &values))
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                required: 30,
                actual: 10
            }
        );
    }

    #[test]
    fn test_misaligned_series_rejected() {
        let a = series("A", &[1.0; 40]);
        let b = series("B", &[1.0; 41]);
        let err = CointegrationTester::new(0.01).unwrap().test(&a, &b).unwrap_err();
        assert!(matches!(err, AnalysisError::Precondition(_)));
    }

    #[test]
    fn test_constant_series_is_singular() {
        let a: Vec<f64> = (0..40).map(|i| (i as f64).sin()).collect();
        let b = vec![2.0; 40];
        let err = CointegrationTester::new(0.01)
            .unwrap()
            .test(&series("A", &a), &series("B", &b))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::SingularRegression(_)));
    }

    #[test]
    fn test_exact_linear_relation_gives_infinite_statistic() {
        let mut rng = Lcg(3);
        let b = random_walk(&mut rng, 100, 4.0, 0.04);
        let a: Vec<f64> = b.iter().map(|v| 0.5 + 2.0 * v).collect();
        let result = CointegrationTester::new(0.01)
            .unwrap()
            .test(&series("A", &a), &series("B", &b))
            .unwrap();
        assert_eq!(result.statistic, f64::NEG_INFINITY);
        assert_eq!(result.p_value, 0.0);
        assert!(result.is_cointegrated);
    }

    #[test]
    fn test_invalid_significance() {
        assert!(CointegrationTester::new(0.0).is_err());
        assert!(CointegrationTester::new(1.0).is_err());
        assert!(CointegrationTester::new(f64::NAN).is_err());
    }

    #[test]
    fn test_max_lag_above_limit_rejected() {
        let (a, b) = cointegrated_pair(40);
        let err = CointegrationTester::new(0.01)
            .unwrap()
            .with_max_lag(Some(25))
            .test(&a, &b)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }

    #[test]
    fn test_p_value_boundaries() {
        assert_eq!(mackinnon_p_value(1.5), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
        assert_eq!(mackinnon_p_value(f64::NEG_INFINITY), 0.0);
        assert_eq!(mackinnon_p_value(f64::NAN), 1.0);
        // Monotone across the switch between the two polynomials
        let below = mackinnon_p_value(TAU_STAR - 1e-9);
        let above = mackinnon_p_value(TAU_STAR + 1e-9);
        assert!((below - above).abs() < 5e-3);
        assert!(mackinnon_p_value(-4.0) < mackinnon_p_value(-3.0));
        assert!(mackinnon_p_value(-3.0) < mackinnon_p_value(-1.0));
    }

    #[test]
    fn test_p_value_near_five_percent_critical_value() {
        // Asymptotic 5% critical value for two variables is about -3.34
        let p = mackinnon_p_value(-3.34);
        assert!((p - 0.05).abs() < 0.01, "p = {}", p);
    }

    #[test]
    fn test_critical_values_large_sample() {
        let cv = mackinnon_critical_values(1_000_000);
        assert!((cv.one_pct - TAU_CRIT_1[0]).abs() < 1e-4);
        assert!((cv.five_pct - TAU_CRIT_5[0]).abs() < 1e-4);
        assert!((cv.ten_pct - TAU_CRIT_10[0]).abs() < 1e-4);
        let small = mackinnon_critical_values(50);
        assert!(small.one_pct < cv.one_pct);
    }
}
