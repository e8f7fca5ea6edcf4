// pairs-core/src/backtest/engine.rs

use super::metrics::MetricsCalculator;
use super::{types::*, Strategy};
use chrono::NaiveDate;
use pairs_common::{Position, SignalSeries};
use rust_decimal::prelude::*;
use tracing::{debug, info, warn};

/// Single-instrument broker simulation with exclusive positions
pub struct BacktestEngine {
    config: BacktestConfig,
    portfolio: Portfolio,
    fills: Vec<Trade>,
    closed_trades: Vec<ClosedTrade>,
    metrics_calculator: MetricsCalculator,
    equity_points: Vec<EquityPoint>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self {
            portfolio: Portfolio::new(config.initial_capital),
            metrics_calculator: MetricsCalculator::new(config.risk_free_rate),
            config,
            fills: Vec::new(),
            closed_trades: Vec::new(),
            equity_points: Vec::new(),
        })
    }

    pub fn run(
        &mut self,
        bars: &[BacktestBar],
        mut strategy: Box<dyn Strategy>,
    ) -> Result<BacktestResult, BacktestError> {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(BacktestError::EmptyInput),
        };

        self.reset();
        strategy.reset();

        info!(
            "Starting backtest for {}: {} bars from {} to {} ({:?} fills)",
            self.config.symbol,
            bars.len(),
            first.date,
            last.date,
            self.config.fill
        );

        let mut pending: Vec<Order> = Vec::new();

        for (i, bar) in bars.iter().enumerate() {
            // Orders raised on the previous bar fill at this bar's open
            for order in std::mem::take(&mut pending) {
                self.execute_order(&order, bar.open, bar.date);
            }

            let orders = strategy.on_bar(bar, self.portfolio.side());
            match self.config.fill {
                FillTiming::SameBar => {
                    for order in &orders {
                        self.execute_order(order, bar.close, bar.date);
                    }
                }
                FillTiming::NextBar => pending = orders,
            }

            if i + 1 == bars.len() && self.config.close_at_end && self.portfolio.position.is_some() {
                debug!("Closing open position at the end of the data");
                self.close_position(bar.close, bar.date);
            }

            self.update_portfolio_value(bar.close);
            self.record_equity_point(bar.date);
        }

        if !pending.is_empty() {
            debug!("{} orders raised on the final bar were never filled", pending.len());
        }

        info!(
            "Backtest completed: {} fills, {} closed trades. Calculating metrics...",
            self.fills.len(),
            self.closed_trades.len()
        );

        let metrics = self.metrics_calculator.calculate(
            self.config.initial_capital,
            &self.fills,
            &self.closed_trades,
            &self.equity_points,
            bars,
        );

        Ok(BacktestResult {
            strategy: strategy.name().to_string(),
            parameters: strategy.parameters(),
            metrics,
            fills: self.fills.clone(),
            trades: self.closed_trades.clone(),
            equity_curve: self.equity_points.clone(),
        })
    }

    fn reset(&mut self) {
        self.portfolio = Portfolio::new(self.config.initial_capital);
        self.fills.clear();
        self.closed_trades.clear();
        self.equity_points.clear();
    }

    fn execute_order(&mut self, order: &Order, price: Decimal, date: NaiveDate) {
        match order.action {
            OrderAction::Close => {
                if self.portfolio.position.is_some() {
                    self.close_position(price, date);
                } else {
                    debug!("Close order on {} with no open position", date);
                }
            }
            OrderAction::OpenLong => self.open_position(PositionSide::Long, price, date),
            OrderAction::OpenShort => self.open_position(PositionSide::Short, price, date),
        }
    }

    fn open_position(&mut self, side: PositionSide, price: Decimal, date: NaiveDate) {
        // Exclusive orders: never hold two positions
        if self.portfolio.position.is_some() {
            self.close_position(price, date);
        }

        let equity = self.portfolio.equity_at(price);
        let unit_cost = price * (Decimal::ONE + self.config.commission_rate);
        let quantity = if equity > Decimal::ZERO && unit_cost > Decimal::ZERO {
            (equity * self.config.size_fraction / unit_cost).floor()
        } else {
            Decimal::ZERO
        };
        if quantity <= Decimal::ZERO {
            warn!(
                "Insufficient equity ({}) to open a {:?} position at {} on {}",
                equity, side, price, date
            );
            return;
        }

        let notional = quantity * price;
        let commission = notional * self.config.commission_rate;
        let order_side = match side {
            PositionSide::Long => {
                self.portfolio.cash -= notional + commission;
                OrderSide::Buy
            }
            PositionSide::Short => {
                self.portfolio.cash += notional - commission;
                OrderSide::Sell
            }
        };

        self.record_fill(order_side, quantity, price, date, commission);
        self.portfolio.position = Some(OpenPosition {
            side,
            quantity,
            entry_price: price,
            entry_date: date,
            entry_commission: commission,
        });
    }

    fn close_position(&mut self, price: Decimal, date: NaiveDate) {
        let Some(position) = self.portfolio.position.take() else {
            return;
        };

        let notional = position.quantity * price;
        let commission = notional * self.config.commission_rate;
        let (order_side, gross) = match position.side {
            PositionSide::Long => {
                self.portfolio.cash += notional - commission;
                (OrderSide::Sell, (price - position.entry_price) * position.quantity)
            }
            PositionSide::Short => {
                self.portfolio.cash -= notional + commission;
                (OrderSide::Buy, (position.entry_price - price) * position.quantity)
            }
        };
        self.record_fill(order_side, position.quantity, price, date, commission);

        let total_commission = position.entry_commission + commission;
        let pnl = gross - total_commission;
        let entry_notional = position.entry_price * position.quantity;
        let return_pct = if entry_notional.is_zero() {
            Decimal::ZERO
        } else {
            pnl / entry_notional * Decimal::ONE_HUNDRED
        };

        self.closed_trades.push(ClosedTrade {
            side: position.side,
            quantity: position.quantity,
            entry_date: position.entry_date,
            exit_date: date,
            entry_price: position.entry_price,
            exit_price: price,
            pnl,
            return_pct,
            commission: total_commission,
        });
    }

    fn record_fill(&mut self, side: OrderSide, quantity: Decimal, price: Decimal, date: NaiveDate, commission: Decimal) {
        info!(
            "Executed trade: {} {} {} {} @ {} (commission {})",
            date,
            if side == OrderSide::Buy { "BUY" } else { "SELL" },
            quantity,
            self.config.symbol,
            price.round_dp(4),
            commission.round_dp(4)
        );
        self.fills.push(Trade {
            symbol: self.config.symbol.clone(),
            side,
            quantity,
            price,
            date,
            commission,
        });
    }

    fn update_portfolio_value(&mut self, price: Decimal) {
        self.portfolio.total_value = self.portfolio.equity_at(price);
    }

    fn record_equity_point(&mut self, date: NaiveDate) {
        self.equity_points.push(EquityPoint {
            date,
            value: self.portfolio.total_value,
            position: self
                .portfolio
                .side()
                .map(PositionSide::as_position)
                .unwrap_or(Position::Flat),
        });
    }
}

/// Bars for the backtest from `(date, log price)` pairs and the aligned signals.
///
/// All four prices of a bar are `exp(log price)`.
pub fn build_bars(prices: &[(NaiveDate, f64)], signals: &SignalSeries) -> Result<Vec<BacktestBar>, BacktestError> {
    if prices.len() != signals.len() {
        return Err(BacktestError::MisalignedInput(format!(
            "{} prices against {} signals",
            prices.len(),
            signals.len()
        )));
    }

    prices
        .iter()
        .zip(signals.points())
        .map(|(&(date, log_price), signal)| {
            if date != signal.date {
                return Err(BacktestError::MisalignedInput(format!(
                    "price dated {} paired with signal dated {}",
                    date, signal.date
                )));
            }
            let value = log_price.exp();
            let price = Decimal::from_f64(value)
                .filter(|p| *p > Decimal::ZERO)
                .ok_or(BacktestError::InvalidPrice { date, value })?;
            Ok(BacktestBar {
                date,
                open: price,
                high: price,
                low: price,
                close: price,
                signal: signal.position,
            })
        })
        .collect()
}
