// pairs-core/src/backtest/types.rs

use chrono::NaiveDate;
use pairs_common::Position;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Invalid backtest configuration: {0}")]
    InvalidConfig(String),

    #[error("Price and signal series are misaligned: {0}")]
    MisalignedInput(String),

    #[error("No bars to backtest")]
    EmptyInput,

    #[error("Price on {date} cannot be represented: {value}")]
    InvalidPrice { date: NaiveDate, value: f64 },
}

/// When an order raised on a bar is filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillTiming {
    /// At the close of the bar that produced the signal
    #[default]
    SameBar,
    /// At the open of the following bar
    NextBar,
}

// Base configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbol: String,
    pub initial_capital: Decimal,
    pub commission_rate: Decimal,
    pub size_fraction: Decimal,
    pub fill: FillTiming,
    pub close_at_end: bool,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            initial_capital: Decimal::from(100_000),
            commission_rate: Decimal::new(1, 3),
            size_fraction: Decimal::new(9999, 4),
            fill: FillTiming::SameBar,
            close_at_end: true,
            risk_free_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(
                "initial capital must be positive".to_string(),
            ));
        }
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(BacktestError::InvalidConfig(
                "commission rate must lie in [0, 1)".to_string(),
            ));
        }
        if self.size_fraction <= Decimal::ZERO || self.size_fraction > Decimal::ONE {
            return Err(BacktestError::InvalidConfig(
                "size fraction must lie in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// One tradeable bar carrying the target position for that date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub signal: Position,
}

// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// What an order asks the broker to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    /// Buy `size_fraction` of equity
    OpenLong,
    /// Sell short `size_fraction` of equity
    OpenShort,
    /// Flatten whatever is open
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub action: OrderAction,
    pub date: NaiveDate,
}

/// Executed fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
    pub commission: Decimal,
}

/// Direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_position(self) -> Position {
        match self {
            PositionSide::Long => Position::Long,
            PositionSide::Short => Position::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    /// Units held, always positive
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub entry_date: NaiveDate,
    pub entry_commission: Decimal,
}

impl OpenPosition {
    /// Signed market value: shorts count against equity
    pub fn market_value(&self, price: Decimal) -> Decimal {
        match self.side {
            PositionSide::Long => self.quantity * price,
            PositionSide::Short => -(self.quantity * price),
        }
    }
}

/// Round trip from entry to exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Profit after both commissions
    pub pnl: Decimal,
    /// `pnl` relative to the entry notional, in percent
    pub return_pct: Decimal,
    pub commission: Decimal,
}

impl ClosedTrade {
    pub fn duration_days(&self) -> i64 {
        (self.exit_date - self.entry_date).num_days()
    }
}

// Portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    /// At most one open position
    pub position: Option<OpenPosition>,
    pub total_value: Decimal,
}

impl Portfolio {
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            position: None,
            total_value: cash,
        }
    }

    pub fn side(&self) -> Option<PositionSide> {
        self.position.as_ref().map(|p| p.side)
    }

    pub fn equity_at(&self, price: Decimal) -> Decimal {
        self.cash
            + self
                .position
                .as_ref()
                .map(|p| p.market_value(price))
                .unwrap_or_default()
    }
}

// Equity point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: Decimal,
    /// Position held at the close of the bar
    pub position: Position,
}

// Backtest result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub parameters: HashMap<String, String>,
    pub metrics: Metrics,
    pub fills: Vec<Trade>,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

// Performance metrics; percentages are in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration_days: i64,
    pub exposure_time: f64,
    pub equity_final: Decimal,
    pub equity_peak: Decimal,

    // Return metrics
    pub total_return: Decimal,
    pub buy_and_hold_return: Decimal,
    pub annual_return: f64,
    pub annual_volatility: f64,

    // Risk metrics
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: Decimal,
    pub max_drawdown_duration: i64,

    // Trade metrics
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: Decimal,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
    pub avg_trade: Decimal,
    pub profit_factor: Decimal,
    pub avg_trade_duration: f64,

    // Additional stats
    pub total_commission: Decimal,
    pub total_volume: Decimal,
}
