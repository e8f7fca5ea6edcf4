use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pairs_core::{
    backtest::{BacktestResult, FillTiming, OrderSide},
    config::{ProviderKind, Settings},
    provider,
    service::{PairsPipeline, PipelineOutcome, PipelineReport},
};

const EXIT_NOT_COINTEGRATED: u8 = 2;

#[derive(Parser)]
#[command(name = "pairs-trade")]
#[command(about = "Cointegration-based pairs trading research pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Cointegration diagnostics and hedge ratio
    Analyze,
    /// Diagnostics plus the position changes of the z-score signal
    Signals,
    /// Full pipeline including the backtest
    Backtest,
}

#[derive(Args)]
struct RunArgs {
    #[arg(short = 'a', long, global = true)]
    ticker_a: Option<String>,
    #[arg(short = 'b', long, global = true)]
    ticker_b: Option<String>,
    /// First date, YYYY-MM-DD
    #[arg(long, global = true)]
    start: Option<NaiveDate>,
    /// Last date (inclusive), YYYY-MM-DD; defaults to today
    #[arg(long, global = true)]
    end: Option<NaiveDate>,
    #[arg(long, global = true)]
    significance: Option<f64>,
    /// Rolling and EWM window
    #[arg(long, global = true)]
    window: Option<usize>,
    #[arg(long, global = true)]
    entry: Option<f64>,
    #[arg(long, global = true)]
    exit: Option<f64>,
    #[arg(long, value_enum, global = true)]
    fill: Option<FillArg>,
    #[arg(long, global = true)]
    commission: Option<Decimal>,
    /// Starting cash for the backtest
    #[arg(long, global = true)]
    cash: Option<Decimal>,
    #[arg(long, value_enum, global = true)]
    provider: Option<ProviderArg>,
    /// Directory of `{SYMBOL}.csv` files for the csv provider
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum FillArg {
    SameBar,
    NextBar,
}

#[derive(ValueEnum, Clone, Copy)]
enum ProviderArg {
    Yahoo,
    Csv,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        let pipeline = &mut settings.pipeline;
        if let Some(ticker) = &self.ticker_a {
            pipeline.ticker_a = ticker.clone();
        }
        if let Some(ticker) = &self.ticker_b {
            pipeline.ticker_b = ticker.clone();
        }
        if let Some(start) = self.start {
            pipeline.start_date = start;
        }
        if self.end.is_some() {
            pipeline.end_date = self.end;
        }
        if let Some(significance) = self.significance {
            pipeline.significance = significance;
        }
        if let Some(window) = self.window {
            pipeline.window = window;
        }
        if let Some(entry) = self.entry {
            pipeline.entry_threshold = entry;
        }
        if let Some(exit) = self.exit {
            pipeline.exit_threshold = exit;
        }

        let backtest = &mut settings.backtest;
        if let Some(fill) = self.fill {
            backtest.fill = match fill {
                FillArg::SameBar => FillTiming::SameBar,
                FillArg::NextBar => FillTiming::NextBar,
            };
        }
        if let Some(commission) = self.commission {
            backtest.commission_rate = commission;
        }
        if let Some(cash) = self.cash {
            backtest.initial_capital = cash;
        }

        if let Some(kind) = self.provider {
            settings.provider.kind = match kind {
                ProviderArg::Yahoo => ProviderKind::Yahoo,
                ProviderArg::Csv => ProviderKind::Csv,
            };
        }
        if let Some(dir) = &self.csv_dir {
            settings.provider.csv_dir = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    ExitCode::from(exit_status(&result))
}

/// 0 for a completed run, 2 when the pair is not cointegrated, 1 on any error
fn exit_status(result: &anyhow::Result<PipelineOutcome>) -> u8 {
    match result {
        Ok(outcome) if outcome.is_cointegrated() => 0,
        Ok(_) => EXIT_NOT_COINTEGRATED,
        Err(_) => 1,
    }
}

async fn run(cli: Cli) -> anyhow::Result<PipelineOutcome> {
    let mut settings = Settings::new().context("Failed to load configuration")?;
    cli.run.apply(&mut settings);

    let provider = provider::from_settings(&settings.provider);
    let pipeline = PairsPipeline::new(provider);

    let backtest = (cli.command == Commands::Backtest).then_some(&settings.backtest);
    let outcome = pipeline
        .run(&settings.pipeline, backtest)
        .await
        .with_context(|| {
            format!(
                "Pipeline failed for {}/{}",
                settings.pipeline.ticker_a, settings.pipeline.ticker_b
            )
        })?;

    if cli.run.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(cli.command, &outcome);
    }

    if !outcome.is_cointegrated() {
        info!("Pair is not cointegrated; nothing further to run");
    }
    Ok(outcome)
}

fn print_outcome(command: Commands, outcome: &PipelineOutcome) {
    let pair = outcome.pair();
    let coint = outcome.cointegration();

    println!("\nCointegration Test: {} / {}", pair.symbol_a, pair.symbol_b);
    println!("Window: {} to {} ({} observations)", pair.start, pair.end, pair.observations);
    println!("Test Statistic: {:.4}", coint.statistic);
    println!("P-Value: {:.6}", coint.p_value);
    println!(
        "Critical Values: 1% {:.4}, 5% {:.4}, 10% {:.4}",
        coint.critical_values.one_pct, coint.critical_values.five_pct, coint.critical_values.ten_pct
    );
    println!("Lags Used: {}", coint.lags_used);
    println!(
        "Cointegrated at {}: {}",
        coint.significance,
        if coint.is_cointegrated { "YES" } else { "NO" }
    );

    let report = match outcome.report() {
        Some(report) => report,
        None => return,
    };

    println!("\nHedge Ratio (beta): {:.6}", report.hedge.beta);
    println!("Intercept: {:.6}", report.hedge.intercept);
    println!("R-Squared: {:.4}", report.hedge.r_squared);
    match report.half_life {
        Some(h) => println!("Half-Life: {:.1} days", h),
        None => println!("Half-Life: n/a"),
    }
    println!(
        "Feature Rows: {} ({} dropped during warm-up)",
        report.features.len(),
        report.features.leading_dropped
    );

    if command == Commands::Signals {
        print_signals(report);
    }
    if let Some(result) = &report.backtest {
        print_backtest(result);
    }
}

fn print_signals(report: &PipelineReport) {
    let transitions = report.signals.transitions();
    println!("\nSignal Changes ({}):", transitions.len());
    for point in transitions {
        println!("{} {}", point.date.format("%Y-%m-%d"), point.position);
    }
    if let Some(last) = report.signals.points().last() {
        println!("Current Position: {} (as of {})", last.position, last.date);
    }
}

fn print_backtest(result: &BacktestResult) {
    let m = &result.metrics;
    println!("\nBacktest Results:");
    println!("Start: {}", m.start);
    println!("End: {}", m.end);
    println!("Duration: {} days", m.duration_days);
    println!("Exposure Time: {:.2}%", m.exposure_time);
    println!("Equity Final: {:.2}", m.equity_final);
    println!("Equity Peak: {:.2}", m.equity_peak);
    println!("Total Return: {:.2}%", m.total_return);
    println!("Buy & Hold Return: {:.2}%", m.buy_and_hold_return);
    println!("Annual Return: {:.2}%", m.annual_return);
    println!("Annual Volatility: {:.2}%", m.annual_volatility);
    println!("Sharpe Ratio: {:.3}", m.sharpe_ratio);
    println!("Sortino Ratio: {:.3}", m.sortino_ratio);
    println!("Max Drawdown: {:.2}%", m.max_drawdown);
    println!("Max Drawdown Duration: {} days", m.max_drawdown_duration);
    println!("Total Trades: {}", m.total_trades);
    println!("Win Rate: {:.2}%", m.win_rate);
    println!("Best Trade: {:.2}%", m.best_trade);
    println!("Worst Trade: {:.2}%", m.worst_trade);
    println!("Avg Trade: {:.2}%", m.avg_trade);
    println!("Profit Factor: {:.3}", m.profit_factor);
    println!("Avg Trade Duration: {:.1} days", m.avg_trade_duration);
    println!("Total Commission: {:.2}", m.total_commission);

    println!("\nTrade History:");
    for trade in &result.fills {
        println!(
            "{} {} {} @ {:.4}",
            trade.date.format("%Y-%m-%d"),
            if trade.side == OrderSide::Buy { "BUY" } else { "SELL" },
            trade.quantity,
            trade.price
        );
    }
}
