// pairs-core/src/backtest/metrics.rs

use super::types::*;
use crate::analysis::stats::{mean, sample_std};
use chrono::NaiveDate;
use pairs_common::Position;
use rust_decimal::prelude::*;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub struct MetricsCalculator {
    /// Annual risk-free rate for the Sharpe and Sortino ratios
    risk_free_rate: f64,
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64) -> Self {
        Self { risk_free_rate }
    }

    pub fn calculate(
        &self,
        initial_capital: Decimal,
        fills: &[Trade],
        trades: &[ClosedTrade],
        equity_points: &[EquityPoint],
        bars: &[BacktestBar],
    ) -> Metrics {
        let start = equity_points.first().map(|p| p.date).unwrap_or_default();
        let end = equity_points.last().map(|p| p.date).unwrap_or(start);
        let equity_final = equity_points.last().map(|p| p.value).unwrap_or(initial_capital);

        let returns = self.calculate_returns(initial_capital, equity_points);
        let (max_drawdown, max_drawdown_duration) = self.calculate_drawdown(initial_capital, equity_points);
        let (winning, losing): (Vec<&ClosedTrade>, Vec<&ClosedTrade>) =
            trades.iter().filter(|t| !t.pnl.is_zero()).partition(|t| t.pnl > Decimal::ZERO);

        Metrics {
            start,
            end,
            duration_days: (end - start).num_days(),
            exposure_time: self.calculate_exposure(equity_points),
            equity_final,
            equity_peak: equity_points
                .iter()
                .map(|p| p.value)
                .fold(initial_capital, Decimal::max),

            total_return: percent_change(initial_capital, equity_final),
            buy_and_hold_return: match (bars.first(), bars.last()) {
                (Some(first), Some(last)) => percent_change(first.close, last.close),
                _ => Decimal::ZERO,
            },
            annual_return: self.calculate_annual_return(initial_capital, equity_final, returns.len()),
            annual_volatility: self.calculate_annual_volatility(&returns),

            sharpe_ratio: self.calculate_sharpe_ratio(&returns),
            sortino_ratio: self.calculate_sortino_ratio(&returns),
            max_drawdown,
            max_drawdown_duration,

            total_trades: trades.len() as u32,
            winning_trades: winning.len() as u32,
            losing_trades: losing.len() as u32,
            win_rate: self.calculate_win_rate(winning.len(), trades.len()),
            best_trade: trades.iter().map(|t| t.return_pct).max().unwrap_or_default(),
            worst_trade: trades.iter().map(|t| t.return_pct).min().unwrap_or_default(),
            avg_trade: self.calculate_avg_trade(trades),
            profit_factor: self.calculate_profit_factor(&winning, &losing),
            avg_trade_duration: if trades.is_empty() {
                0.0
            } else {
                trades.iter().map(|t| t.duration_days() as f64).sum::<f64>() / trades.len() as f64
            },

            total_commission: fills.iter().map(|t| t.commission).sum(),
            total_volume: self.calculate_total_volume(fills),
        }
    }

    /// Bar-to-bar equity returns, the first one measured from the initial capital
    fn calculate_returns(&self, initial_capital: Decimal, equity_points: &[EquityPoint]) -> Vec<f64> {
        let mut previous = initial_capital;
        equity_points
            .iter()
            .map(|point| {
                let r = if previous.is_zero() {
                    0.0
                } else {
                    ((point.value - previous) / previous).to_f64().unwrap_or_default()
                };
                previous = point.value;
                r
            })
            .collect()
    }

    /// Deepest peak-to-trough loss in percent and the longest time under water in days
    fn calculate_drawdown(&self, initial_capital: Decimal, equity_points: &[EquityPoint]) -> (Decimal, i64) {
        let mut max_drawdown = Decimal::ZERO;
        let mut max_duration = 0i64;
        let mut peak_value = initial_capital;
        let mut peak_date: Option<NaiveDate> = equity_points.first().map(|p| p.date);

        for point in equity_points {
            if point.value >= peak_value {
                peak_value = point.value;
                peak_date = Some(point.date);
            } else if peak_value > Decimal::ZERO {
                let drawdown = (peak_value - point.value) / peak_value * Decimal::ONE_HUNDRED;
                max_drawdown = max_drawdown.max(drawdown);
                if let Some(peak_date) = peak_date {
                    max_duration = max_duration.max((point.date - peak_date).num_days());
                }
            }
        }

        (max_drawdown, max_duration)
    }

    fn calculate_exposure(&self, equity_points: &[EquityPoint]) -> f64 {
        if equity_points.is_empty() {
            return 0.0;
        }
        let exposed = equity_points
            .iter()
            .filter(|p| p.position != Position::Flat)
            .count();
        exposed as f64 / equity_points.len() as f64 * 100.0
    }

    /// Geometric annualisation of the total return, in percent
    fn calculate_annual_return(&self, initial: Decimal, last: Decimal, periods: usize) -> f64 {
        let growth = match (initial.to_f64(), last.to_f64()) {
            (Some(i), Some(l)) if i > 0.0 => l / i,
            _ => return 0.0,
        };
        if periods == 0 {
            return 0.0;
        }
        if growth <= 0.0 {
            return -100.0;
        }
        (growth.powf(TRADING_DAYS_PER_YEAR / periods as f64) - 1.0) * 100.0
    }

    /// Sample deviation of bar returns scaled to a year, in percent; zero below two returns
    fn calculate_annual_volatility(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
    }

    fn calculate_win_rate(&self, winning_trades: usize, total_trades: usize) -> Decimal {
        if total_trades == 0 {
            return Decimal::ZERO;
        }

        Decimal::from(winning_trades) / Decimal::from(total_trades) * Decimal::ONE_HUNDRED
    }

    /// Mean trade return in percent
    fn calculate_avg_trade(&self, trades: &[ClosedTrade]) -> Decimal {
        if trades.is_empty() {
            return Decimal::ZERO;
        }

        trades.iter().map(|t| t.return_pct).sum::<Decimal>() / Decimal::from(trades.len())
    }

    fn calculate_profit_factor(&self, winning: &[&ClosedTrade], losing: &[&ClosedTrade]) -> Decimal {
        let total_profit = winning.iter().map(|t| t.pnl).sum::<Decimal>();
        let total_loss = losing.iter().map(|t| -t.pnl).sum::<Decimal>();

        if total_loss.is_zero() {
            return if total_profit.is_zero() { Decimal::ONE } else { Decimal::MAX };
        }

        total_profit / total_loss
    }

    fn calculate_sharpe_ratio(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        let mean_return = mean(returns);
        let volatility = sample_std(returns) * TRADING_DAYS_PER_YEAR.sqrt();

        if volatility == 0.0 {
            return 0.0;
        }

        (mean_return * TRADING_DAYS_PER_YEAR - self.risk_free_rate) / volatility
    }

    fn calculate_sortino_ratio(&self, returns: &[f64]) -> f64 {
        if returns.is_empty() {
            return 0.0;
        }

        let mean_return = mean(returns);
        let downside_sq = returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / returns.len() as f64;
        let downside_deviation = downside_sq.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();

        if downside_deviation == 0.0 {
            return 0.0;
        }

        (mean_return * TRADING_DAYS_PER_YEAR - self.risk_free_rate) / downside_deviation
    }

    fn calculate_total_volume(&self, fills: &[Trade]) -> Decimal {
        fills.iter().map(|t| t.quantity * t.price).sum()
    }
}

fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        return Decimal::ZERO;
    }
    (to - from) / from * Decimal::ONE_HUNDRED
}
