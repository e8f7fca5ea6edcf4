// =================================================================
// analysis/features.rs - Rolling Feature Computation
// =================================================================

use pairs_common::PricePair;
use tracing::debug;

use super::errors::AnalysisError;
use super::stats::{ewm_mean_std, rolling_mean, rolling_std, EwmStd};
use super::types::{FeatureFrame, FeatureRow, Spread};

pub const DEFAULT_WINDOW: usize = 60;
pub const DEFAULT_MA_WINDOW: usize = 20;
pub const DEFAULT_ROC_PERIOD: usize = 5;

/// Derives the per-date feature rows for a pair and its spread.
///
/// `window` drives the z-score EWM span and the volatility window;
/// `ma_window` drives every simple moving average.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    window: usize,
    ma_window: usize,
    roc_period: usize,
    ewm_std: EwmStd,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            ma_window: DEFAULT_MA_WINDOW,
            roc_period: DEFAULT_ROC_PERIOD,
            ewm_std: EwmStd::default(),
        }
    }
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_ma_window(mut self, ma_window: usize) -> Self {
        self.ma_window = ma_window;
        self
    }

    pub fn with_roc_period(mut self, roc_period: usize) -> Self {
        self.roc_period = roc_period;
        self
    }

    pub fn with_ewm_std(mut self, ewm_std: EwmStd) -> Self {
        self.ewm_std = ewm_std;
        self
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        let checks = [
            ("window", self.window, 2),
            ("ma_window", self.ma_window, 1),
            ("roc_period", self.roc_period, 1),
        ];
        for (field, value, min) in checks {
            if value < min {
                return Err(AnalysisError::InvalidParameter {
                    field: field.into(),
                    reason: format!("must be at least {}, got {}", min, value),
                });
            }
        }
        Ok(())
    }

    pub fn compute(&self, pair: &PricePair, spread: &Spread) -> Result<FeatureFrame, AnalysisError> {
        self.validate()?;
        if pair.is_empty() {
            return Err(AnalysisError::DataUnavailable(format!(
                "no aligned prices for {}/{}",
                pair.symbol_a, pair.symbol_b
            )));
        }
        if spread.dates() != pair.dates() {
            return Err(AnalysisError::Precondition(
                "spread does not cover the same dates as the price pair".into(),
            ));
        }

        let n = pair.len();
        let s = spread.values();

        let defined = |values: &[f64]| values.iter().map(|v| Some(*v)).collect::<Vec<_>>();

        let price_ma_a = rolling_mean(&defined(pair.log_a()), self.ma_window)?;
        let price_ma_b = rolling_mean(&defined(pair.log_b()), self.ma_window)?;
        let spread_ma = rolling_mean(&defined(s), self.ma_window)?;

        let (ewm_mean, ewm_std) = ewm_mean_std(s, self.window, self.ewm_std)?;
        let z_score: Vec<Option<f64>> = (0..n)
            .map(|t| match ewm_std[t] {
                Some(sd) if sd > 0.0 => Some((s[t] - ewm_mean[t]) / sd),
                _ => None,
            })
            .collect();
        let z_score_ma = rolling_mean(&z_score, self.ma_window)?;

        let log_return_a = first_difference(pair.log_a());
        let log_return_b = first_difference(pair.log_b());
        let volatility_a = rolling_std(&log_return_a, self.window)?;
        let volatility_b = rolling_std(&log_return_b, self.window)?;

        let spread_roc = rate_of_change(s, self.roc_period);

        let mut rows = Vec::with_capacity(n.saturating_sub(self.window));
        let mut leading_dropped = None;
        for t in 0..n {
            let row = (|| {
                Some(FeatureRow {
                    date: pair.dates()[t],
                    log_price_a: pair.log_a()[t],
                    log_price_b: pair.log_b()[t],
                    price_ma_a: price_ma_a[t]?,
                    price_ma_b: price_ma_b[t]?,
                    spread: s[t],
                    spread_ma: spread_ma[t]?,
                    z_score: z_score[t]?,
                    z_score_ma: z_score_ma[t]?,
                    log_return_a: log_return_a[t]?,
                    log_return_b: log_return_b[t]?,
                    volatility_a: volatility_a[t]?,
                    volatility_b: volatility_b[t]?,
                    spread_roc: spread_roc[t]?,
                    volume_a: pair.volume_a()[t]?,
                    volume_b: pair.volume_b()[t]?,
                })
            })();
            if let Some(row) = row {
                leading_dropped.get_or_insert(t);
                rows.push(row);
            }
        }

        let frame = FeatureFrame {
            symbol_a: pair.symbol_a.clone(),
            symbol_b: pair.symbol_b.clone(),
            window: self.window,
            ma_window: self.ma_window,
            leading_dropped: leading_dropped.unwrap_or(n),
            total_dropped: n - rows.len(),
            rows,
        };

        debug!(
            "Features {}/{}: kept {} of {} rows ({} leading dropped)",
            frame.symbol_a,
            frame.symbol_b,
            frame.len(),
            n,
            frame.leading_dropped
        );

        Ok(frame)
    }
}

/// `x[t] - x[t-1]`, undefined at the first observation.
fn first_difference(values: &[f64]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.windows(2).map(|w| Some(w[1] - w[0])))
        .take(values.len())
        .collect()
}

/// `(x[t] - x[t-p]) / x[t-p]`, undefined for the first `p` observations
/// and wherever the base value is zero.
fn rate_of_change(values: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let base = values[t.checked_sub(period)?];
            (base != 0.0).then(|| (values[t] - base) / base)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pairs_common::data::types::Bar;
    use pairs_common::{align_pair, OhlcvSeries};

    fn bars(prices: &[f64], volumes: &[Option<u64>]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        prices
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&p, &volume))| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
                adj_close: p,
                volume,
            })
            .collect()
    }

    fn pair_with_volumes(n: usize, volume_b: Vec<Option<u64>>) -> PricePair {
        let pa: Vec<f64> = (0..n).map(|i| 50.0 + 5.0 * (i as f64 * 0.21).sin() + i as f64 * 0.05).collect();
        let pb: Vec<f64> = (0..n).map(|i| 30.0 + 3.0 * (i as f64 * 0.17).cos() + i as f64 * 0.03).collect();
        let a = OhlcvSeries::new("A", bars(&pa, &vec![Some(1_000); n])).unwrap();
        let b = OhlcvSeries::new("B", bars(&pb, &volume_b)).unwrap();
        align_pair(&a, &b).unwrap()
    }

    fn spread_for(pair: &PricePair, beta: f64) -> Spread {
        Spread {
            dates: pair.dates().to_vec(),
            values: pair
                .log_a()
                .iter()
                .zip(pair.log_b())
                .map(|(a, b)| a - beta * b)
                .collect(),
        }
    }

    #[test]
    fn test_row_count_drops_only_warm_up() {
        let pair = pair_with_volumes(200, vec![Some(500); 200]);
        let spread = spread_for(&pair, 0.9);
        let frame = FeatureEngine::new().compute(&pair, &spread).unwrap();
        // Volatility needs `window` returns, the first of which is at t = 1.
        assert_eq!(frame.leading_dropped, 60);
        assert_eq!(frame.total_dropped, 60);
        assert_eq!(frame.len(), 200 - frame.leading_dropped);
        assert_eq!(frame.rows[0].date, pair.dates()[60]);
    }

    #[test]
    fn test_short_windows_shift_warm_up() {
        let pair = pair_with_volumes(100, vec![Some(500); 100]);
        let spread = spread_for(&pair, 0.9);
        let frame = FeatureEngine::new()
            .with_window(10)
            .with_ma_window(5)
            .compute(&pair, &spread)
            .unwrap();
        // z-score is undefined at t = 0, so its moving average starts at t = 5.
        assert_eq!(frame.leading_dropped, 10);
        assert_eq!(frame.len(), 90);
    }

    #[test]
    fn test_rows_without_volume_are_excluded() {
        let mut volumes = vec![Some(500); 120];
        volumes[100] = None;
        let pair = pair_with_volumes(120, volumes);
        let frame = FeatureEngine::new().compute(&pair, &spread_for(&pair, 0.9)).unwrap();
        assert_eq!(frame.len(), 59);
        assert_eq!(frame.total_dropped, 61);
        assert!(frame.rows.iter().all(|r| r.date != pair.dates()[100]));
    }

    #[test]
    fn test_feature_values() {
        let pair = pair_with_volumes(120, vec![Some(700); 120]);
        let spread = spread_for(&pair, 0.9);
        let frame = FeatureEngine::new().compute(&pair, &spread).unwrap();
        let row = &frame.rows[0];
        let t = 60;
        let s = spread.values();
        assert!((row.spread - s[t]).abs() < 1e-12);
        let ma: f64 = s[t - 19..=t].iter().sum::<f64>() / 20.0;
        assert!((row.spread_ma - ma).abs() < 1e-9);
        assert!((row.log_return_a - (pair.log_a()[t] - pair.log_a()[t - 1])).abs() < 1e-12);
        assert!((row.spread_roc - (s[t] - s[t - 5]) / s[t - 5]).abs() < 1e-12);
        assert_eq!(row.volume_b, 700);
    }

    #[test]
    fn test_rate_of_change_zero_base_is_missing() {
        let values = [0.0, 1.0, 2.0, 3.0];
        let roc = rate_of_change(&values, 2);
        assert_eq!(roc[0], None);
        assert_eq!(roc[1], None);
        assert_eq!(roc[2], None);
        assert_eq!(roc[3], Some(2.0));
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(&[1.0, 3.0, 6.0]), vec![None, Some(2.0), Some(3.0)]);
        assert!(first_difference(&[]).is_empty());
    }

    #[test]
    fn test_misaligned_spread_rejected() {
        let pair = pair_with_volumes(80, vec![Some(1); 80]);
        let mut spread = spread_for(&pair, 1.0);
        spread.values.pop();
        spread.dates.pop();
        let err = FeatureEngine::new().compute(&pair, &spread).unwrap_err();
        assert!(matches!(err, AnalysisError::Precondition(_)));
    }

    #[test]
    fn test_invalid_window() {
        let pair = pair_with_volumes(80, vec![Some(1); 80]);
        let err = FeatureEngine::new()
            .with_window(1)
            .compute(&pair, &spread_for(&pair, 1.0))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidParameter { .. }));
    }
}
