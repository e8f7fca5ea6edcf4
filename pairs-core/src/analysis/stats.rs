// =================================================================
// analysis/stats.rs - Numerical Primitives
// =================================================================

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use ta::indicators::{SimpleMovingAverage, StandardDeviation};
use ta::{Next, Reset};

use super::errors::AnalysisError;

/// Ordinary least squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Intercept first when the model has one
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub residuals: Vec<f64>,
    pub ssr: f64,
    pub r_squared: f64,
    pub nobs: usize,
    /// Akaike information criterion, Gaussian log-likelihood
    pub aic: f64,
}

/// Fit `y = [1] + X b + e` by the normal equations.
///
/// `columns` are the regressors, each as long as `y`. The intercept is
/// prepended when `intercept` is set. R-squared is centred with an
/// intercept and uncentred without one.
pub fn ols(y: &[f64], columns: &[&[f64]], intercept: bool) -> Result<OlsFit, AnalysisError> {
    let n = y.len();
    let k = columns.len() + usize::from(intercept);
    if k == 0 {
        return Err(AnalysisError::InvalidParameter {
            field: "columns".into(),
            reason: "regression needs at least one regressor".into(),
        });
    }
    if let Some(bad) = columns.iter().find(|c| c.len() != n) {
        return Err(AnalysisError::Precondition(format!(
            "regressor has {} rows but the response has {}",
            bad.len(),
            n
        )));
    }
    if n <= k {
        return Err(AnalysisError::InsufficientData {
            required: k + 1,
            actual: n,
        });
    }

    let offset = usize::from(intercept);
    let x = DMatrix::from_fn(n, k, |i, j| {
        if intercept && j == 0 {
            1.0
        } else {
            columns[j - offset][i]
        }
    });
    let yv = DVector::from_column_slice(y);

    let xt = x.transpose();
    let xtx = &xt * &x;
    let xty = &xt * &yv;

    let chol = xtx
        .clone()
        .cholesky()
        .ok_or_else(|| AnalysisError::SingularRegression("X'X is not positive definite".into()))?;
    // A pivot that vanishes relative to its diagonal means a column is
    // (numerically) a combination of the others.
    let l = chol.l();
    if let Some(j) = (0..k).find(|&j| l[(j, j)] * l[(j, j)] <= 1e-12 * xtx[(j, j)]) {
        return Err(AnalysisError::SingularRegression(format!(
            "regressor {} is collinear with the preceding columns",
            j
        )));
    }
    let beta = chol.solve(&xty);
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AnalysisError::SingularRegression(
            "normal equations produced non-finite coefficients".into(),
        ));
    }
    let xtx_inv = chol.inverse();

    let fitted = &x * &beta;
    let residuals: Vec<f64> = yv.iter().zip(fitted.iter()).map(|(a, b)| a - b).collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();

    let tss = if intercept {
        let m = mean(y);
        y.iter().map(|v| (v - m).powi(2)).sum::<f64>()
    } else {
        y.iter().map(|v| v * v).sum::<f64>()
    };
    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { f64::NAN };

    let df_resid = (n - k) as f64;
    let sigma2 = ssr / df_resid;
    let std_errors: Vec<f64> = (0..k).map(|j| (sigma2 * xtx_inv[(j, j)]).sqrt()).collect();
    let t_values: Vec<f64> = beta
        .iter()
        .zip(&std_errors)
        .map(|(b, se)| b / se)
        .collect();

    let nobs = n as f64;
    let llf = -nobs / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nobs).ln() + 1.0);
    let aic = -2.0 * llf + 2.0 * k as f64;

    Ok(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
        t_values,
        residuals,
        ssr,
        r_squared,
        nobs: n,
        aic,
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Standard deviation with `n - 1` in the denominator.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// True when every value equals the first one.
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

/// Standard normal cumulative distribution function.
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Trailing mean over `window` consecutive defined values.
///
/// A gap resets the window, so the output is only defined once `window`
/// defined values in a row have been seen.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>, AnalysisError> {
    let mut sma = SimpleMovingAverage::new(window)?;
    Ok(rolling_with(values, window, &mut sma, 1.0))
}

/// Trailing sample standard deviation over `window` consecutive defined values.
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>, AnalysisError> {
    if window < 2 {
        return Err(AnalysisError::InvalidParameter {
            field: "window".into(),
            reason: "a sample standard deviation needs a window of at least 2".into(),
        });
    }
    // The indicator reports the population figure; rescale to n - 1.
    let mut sd = StandardDeviation::new(window)?;
    let scale = (window as f64 / (window - 1) as f64).sqrt();
    Ok(rolling_with(values, window, &mut sd, scale))
}

fn rolling_with<I>(values: &[Option<f64>], window: usize, indicator: &mut I, scale: f64) -> Vec<Option<f64>>
where
    I: Next<f64, Output = f64> + Reset,
{
    let mut run = 0usize;
    values
        .iter()
        .map(|v| match v {
            Some(x) if x.is_finite() => {
                run += 1;
                let out = indicator.next(*x) * scale;
                (run >= window).then_some(out)
            }
            _ => {
                if run > 0 {
                    indicator.reset();
                }
                run = 0;
                None
            }
        })
        .collect()
}

/// Convention for the exponentially weighted standard deviation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EwmStd {
    /// Bias-uncorrected recurrence
    #[default]
    Population,
    /// Reliability-weighted correction `W^2 / (W^2 - sum w^2)`
    Unbiased,
}

/// Exponentially weighted mean and standard deviation with `alpha = 2 / (span + 1)`.
///
/// Recursive form without start-up adjustment:
///
/// ```text
/// m_t = (1 - a) m_{t-1} + a x_t
/// v_t = (1 - a) (v_{t-1} + (m_{t-1} - m_t)^2) + a (x_t - m_t)^2
/// ```
///
/// with `m_0 = x_0` and `v_0 = 0`. The unbiased convention is undefined
/// at the first observation.
pub fn ewm_mean_std(
    values: &[f64],
    span: usize,
    convention: EwmStd,
) -> Result<(Vec<f64>, Vec<Option<f64>>), AnalysisError> {
    if span == 0 {
        return Err(AnalysisError::InvalidParameter {
            field: "span".into(),
            reason: "span must be at least 1".into(),
        });
    }
    let Some(&first) = values.first() else {
        return Ok((Vec::new(), Vec::new()));
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut means = Vec::with_capacity(values.len());
    let mut stds = Vec::with_capacity(values.len());

    let mut m = first;
    let mut v = 0.0_f64;
    // Weight sums for the bias correction.
    let mut sum_wt = 1.0_f64;
    let mut sum_wt2 = 1.0_f64;

    let std_of = |v: f64, sum_wt: f64, sum_wt2: f64| -> Option<f64> {
        match convention {
            EwmStd::Population => Some(v.max(0.0).sqrt()),
            EwmStd::Unbiased => {
                let numerator = sum_wt * sum_wt;
                let denominator = numerator - sum_wt2;
                (denominator > 0.0).then(|| (numerator / denominator * v).max(0.0).sqrt())
            }
        }
    };

    means.push(m);
    stds.push(std_of(v, sum_wt, sum_wt2));

    for &x in &values[1..] {
        let old_m = m;
        if m != x {
            m = decay * old_m + alpha * x;
        }
        v = decay * (v + (old_m - m).powi(2)) + alpha * (x - m).powi(2);
        sum_wt = sum_wt * decay + alpha;
        sum_wt2 = sum_wt2 * decay * decay + alpha * alpha;

        means.push(m);
        stds.push(std_of(v, sum_wt, sum_wt2));
    }

    Ok((means, stds))
}
