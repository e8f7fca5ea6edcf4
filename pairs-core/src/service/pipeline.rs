use pairs_common::{align_pair, OhlcvSeries, PricePair};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::PipelineError;
use super::types::{PairSummary, PipelineOutcome, PipelineReport};
use crate::analysis::{
    CointegrationResult, CointegrationTester, FeatureEngine, FeatureFrame, SignalGenerator,
    SpreadBuilder,
};
use crate::backtest::{build_bars, BacktestConfig, BacktestEngine, BacktestResult, SignalFollowStrategy};
use crate::config::{BacktestSettings, PipelineConfig};
use crate::provider::{BarsRequest, DataProvider, ProviderError};

/// The stages a run needs, built and validated from configuration
struct Stages {
    tester: CointegrationTester,
    spread: SpreadBuilder,
    features: FeatureEngine,
    signals: SignalGenerator,
}

impl Stages {
    fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            tester: CointegrationTester::new(config.significance)?
                .with_min_observations(config.min_observations)
                .with_max_lag(config.max_adf_lag),
            spread: SpreadBuilder::new(),
            features: FeatureEngine::new()
                .with_window(config.window)
                .with_ma_window(config.ma_window)
                .with_roc_period(config.roc_period)
                .with_ewm_std(config.ewm_std),
            signals: SignalGenerator::new(config.entry_threshold, config.exit_threshold)?,
        })
    }
}

/// Fetches one pair once and threads it through every stage
pub struct PairsPipeline {
    provider: Arc<dyn DataProvider>,
}

impl PairsPipeline {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    pub async fn run(
        &self,
        config: &PipelineConfig,
        backtest: Option<&BacktestSettings>,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Reject bad parameters before any network I/O
        Stages::from_config(config)?;

        let end = config.end_date_or_today();
        let request = BarsRequest::pair(&config.ticker_a, &config.ticker_b, config.start_date, end)?;
        if request.symbols.len() != 2 {
            return Err(PipelineError::Config(format!(
                "a pair needs two distinct tickers, got {} twice",
                config.ticker_a
            )));
        }

        info!(
            "Running pipeline for {}/{} from {} to {} via {}",
            request.symbols[0],
            request.symbols[1],
            request.start,
            request.end,
            self.provider.name()
        );

        let mut bars = self.provider.fetch_daily_bars(&request).await?;
        let a = bars
            .remove(&request.symbols[0])
            .ok_or_else(|| ProviderError::NoData(request.symbols[0].clone()))?;
        let b = bars
            .remove(&request.symbols[1])
            .ok_or_else(|| ProviderError::NoData(request.symbols[1].clone()))?;

        Self::analyze(&a, &b, config, backtest)
    }

    /// Run every stage on already fetched bars.
    pub fn analyze(
        a: &OhlcvSeries,
        b: &OhlcvSeries,
        config: &PipelineConfig,
        backtest: Option<&BacktestSettings>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let stages = Stages::from_config(config)?;

        let pair = align_pair(a, b)?;
        let summary = summarize(&pair);
        info!(
            "Aligned {} and {}: {} common dates ({} and {} bars fetched)",
            pair.symbol_a,
            pair.symbol_b,
            pair.len(),
            a.len(),
            b.len()
        );

        let series_a = pair.series_a();
        let series_b = pair.series_b();

        let cointegration = stages.tester.test(&series_a, &series_b)?;
        log_cointegration(&summary, &cointegration);

        if !cointegration.is_cointegrated {
            return Ok(PipelineOutcome::NotCointegrated {
                pair: summary,
                cointegration,
            });
        }

        let (hedge, spread) = stages.spread.fit(&series_a, &series_b, &cointegration)?;
        let half_life = spread.half_life();
        info!(
            "Hedge ratio {:.6} (intercept {:.6}, R² {:.4}), half-life {}",
            hedge.beta,
            hedge.intercept,
            hedge.r_squared,
            half_life
                .map(|h| format!("{:.1} days", h))
                .unwrap_or_else(|| "n/a".to_string())
        );

        let features = stages.features.compute(&pair, &spread)?;
        info!(
            "Feature frame: {} rows kept, {} leading and {} total rows dropped",
            features.len(),
            features.leading_dropped,
            features.total_dropped
        );

        let signals = stages.signals.generate_for(&features);
        info!(
            "Generated {} signals with {} position changes",
            signals.len(),
            signals.transitions().len()
        );

        let backtest = match backtest {
            Some(settings) if settings.enabled => run_backtest(&summary, &features, &signals, settings)?,
            _ => None,
        };

        Ok(PipelineOutcome::Completed(Box::new(PipelineReport {
            pair: summary,
            cointegration,
            hedge,
            half_life,
            features,
            signals,
            backtest,
        })))
    }
}

fn summarize(pair: &PricePair) -> PairSummary {
    let dates = pair.dates();
    PairSummary {
        symbol_a: pair.symbol_a.clone(),
        symbol_b: pair.symbol_b.clone(),
        start: dates.first().copied().unwrap_or_default(),
        end: dates.last().copied().unwrap_or_default(),
        observations: pair.len(),
    }
}

fn log_cointegration(pair: &PairSummary, result: &CointegrationResult) {
    info!(
        "Cointegration {}/{}: statistic {:.4}, p-value {:.6} ({} lags, {} obs)",
        pair.symbol_a, pair.symbol_b, result.statistic, result.p_value, result.lags_used, result.observations
    );
    if result.is_cointegrated {
        info!("Pair is cointegrated at significance {}", result.significance);
    } else {
        warn!(
            "Pair is not cointegrated at significance {}; stopping before the spread",
            result.significance
        );
    }
}

/// Trade leg A on the signals; the backtest needs at least one feature row.
fn run_backtest(
    pair: &PairSummary,
    features: &FeatureFrame,
    signals: &pairs_common::SignalSeries,
    settings: &BacktestSettings,
) -> Result<Option<BacktestResult>, PipelineError> {
    if features.is_empty() {
        warn!("No feature rows survived the warm-up; skipping the backtest");
        return Ok(None);
    }

    let bars = build_bars(&features.log_prices_a(), signals)?;
    let config = BacktestConfig {
        symbol: pair.symbol_a.clone(),
        initial_capital: settings.initial_capital,
        commission_rate: settings.commission_rate,
        size_fraction: settings.size_fraction,
        fill: settings.fill,
        close_at_end: settings.close_at_end,
        risk_free_rate: settings.risk_free_rate,
    };
    debug!("Backtest configuration: {:?}", config);

    let mut engine = BacktestEngine::new(config)?;
    let strategy = SignalFollowStrategy::new(pair.symbol_a.clone());
    let result = engine.run(&bars, Box::new(strategy))?;
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisError;
    use crate::provider::InMemoryProvider;
    use chrono::NaiveDate;
    use pairs_common::Bar;

    fn flat_series(symbol: &str, closes: &[f64]) -> OhlcvSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                adj_close: c,
                volume: Some(1_000),
            })
            .collect();
        OhlcvSeries::new(symbol, bars).unwrap()
    }

    #[test]
    fn test_invalid_thresholds_fail_before_alignment() {
        let config = PipelineConfig {
            entry_threshold: 0.5,
            exit_threshold: 1.0,
            ..PipelineConfig::default()
        };
        let a = flat_series("A", &[1.0, 2.0]);
        let err = PairsPipeline::analyze(&a, &a, &config, None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_short_overlap_is_insufficient_data() {
        let a = flat_series("A", &[10.0, 10.5, 10.2, 10.8, 10.4]);
        let b = flat_series("B", &[20.0, 20.4, 20.1, 20.9, 20.3]);
        let err = PairsPipeline::analyze(&a, &b, &PipelineConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Analysis(AnalysisError::InsufficientData { required: 30, actual: 5 })
        ));
        assert!(err.is_data_unavailable());
    }

    #[tokio::test]
    async fn test_same_ticker_twice_is_rejected() {
        let pipeline = PairsPipeline::new(Arc::new(InMemoryProvider::new()));
        let config = PipelineConfig {
            ticker_a: "MA".into(),
            ticker_b: "ma".into(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 1),
            ..PipelineConfig::default()
        };
        let err = pipeline.run(&config, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_data_unavailable() {
        let provider = InMemoryProvider::new().with_series(flat_series("MA", &[1.0, 2.0, 3.0]));
        let pipeline = PairsPipeline::new(Arc::new(provider));
        let config = PipelineConfig {
            ticker_a: "MA".into(),
            ticker_b: "V".into(),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2022, 2, 1),
            ..PipelineConfig::default()
        };
        let err = pipeline.run(&config, None).await.unwrap_err();
        assert!(err.is_data_unavailable(), "{}", err);
    }
}
