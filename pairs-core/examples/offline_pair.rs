//! Runs the full pipeline on a synthetic cointegrated pair without network access.
//!
//! `cargo run --example offline_pair`

use chrono::NaiveDate;
use pairs_common::{Bar, OhlcvSeries};
use pairs_core::config::{BacktestSettings, PipelineConfig};
use pairs_core::provider::InMemoryProvider;
use pairs_core::service::{PairsPipeline, PipelineOutcome};
use std::sync::Arc;

fn synthetic(symbol: &str, logs: &[f64], start: NaiveDate) -> Result<OhlcvSeries, Box<dyn std::error::Error>> {
    let bars = logs
        .iter()
        .enumerate()
        .map(|(i, &log_price)| {
            let p = log_price.exp();
            Bar {
                date: start + chrono::Duration::days(i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
                adj_close: p,
                volume: Some(50_000),
            }
        })
        .collect();
    Ok(OhlcvSeries::new(symbol, bars)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).ok_or("bad start date")?;
    let mut state = 2024u64;
    let mut uniform = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
    };

    let (mut level, mut gap) = (4.5, 0.0);
    let mut log_a = Vec::new();
    let mut log_b = Vec::new();
    for _ in 0..750 {
        level += uniform() * 0.04;
        gap = 0.75 * gap + uniform() * 0.03;
        log_b.push(level);
        log_a.push(0.1 + 0.9 * level + gap);
    }

    let provider = InMemoryProvider::new()
        .with_series(synthetic("LEG-A", &log_a, start)?)
        .with_series(synthetic("LEG-B", &log_b, start)?);
    let pipeline = PairsPipeline::new(Arc::new(provider));

    let config = PipelineConfig {
        ticker_a: "LEG-A".into(),
        ticker_b: "LEG-B".into(),
        start_date: start,
        end_date: Some(start + chrono::Duration::days(749)),
        ..PipelineConfig::default()
    };

    match pipeline.run(&config, Some(&BacktestSettings::default())).await? {
        PipelineOutcome::NotCointegrated { cointegration, .. } => {
            println!("Not cointegrated (p = {:.4})", cointegration.p_value);
        }
        PipelineOutcome::Completed(report) => {
            println!("p-value: {:.3e}", report.cointegration.p_value);
            println!("beta: {:.4}", report.hedge.beta);
            println!("signal changes: {}", report.signals.transitions().len());
            if let Some(backtest) = &report.backtest {
                println!("total return: {:.2}%", backtest.metrics.total_return);
                println!("trades: {}", backtest.metrics.total_trades);
            }
        }
    }
    Ok(())
}
