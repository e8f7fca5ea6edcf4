use crate::backtest::types::{BacktestBar, Order, PositionSide};
use std::collections::HashMap;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Orders to place after seeing `bar`, given the currently open side.
    fn on_bar(&mut self, bar: &BacktestBar, position: Option<PositionSide>) -> Vec<Order>;

    fn parameters(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    /// Reset strategy state for new backtest
    fn reset(&mut self) {
        // Default implementation does nothing
        // Strategies can override if needed
    }
}
