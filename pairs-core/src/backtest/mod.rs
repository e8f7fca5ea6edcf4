pub mod engine;
pub mod metrics;
pub mod strategy;
pub mod types;

pub use engine::{build_bars, BacktestEngine};
pub use metrics::MetricsCalculator;
pub use strategy::{SignalFollowStrategy, Strategy};
pub use types::{
    BacktestBar, BacktestConfig, BacktestError, BacktestResult, ClosedTrade, EquityPoint,
    FillTiming, Metrics, Order, OrderAction, OrderSide, OpenPosition, Portfolio, PositionSide,
    Trade,
};
