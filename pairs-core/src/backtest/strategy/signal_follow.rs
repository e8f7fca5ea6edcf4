// pairs-core/src/backtest/strategy/signal_follow.rs

use crate::backtest::types::{BacktestBar, Order, OrderAction, PositionSide};
use crate::backtest::Strategy;
use pairs_common::Position;
use std::collections::HashMap;

/// Holds exactly the position each bar's signal asks for.
///
/// A change of target closes whatever is open before opening the new side,
/// so at most one position exists at any time.
pub struct SignalFollowStrategy {
    symbol: String,
}

impl SignalFollowStrategy {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    fn order(&self, bar: &BacktestBar, action: OrderAction) -> Order {
        Order {
            symbol: self.symbol.clone(),
            action,
            date: bar.date,
        }
    }
}

impl Strategy for SignalFollowStrategy {
    fn name(&self) -> &str {
        "signal_follow"
    }

    fn on_bar(&mut self, bar: &BacktestBar, position: Option<PositionSide>) -> Vec<Order> {
        let target = match bar.signal {
            Position::Long => Some(PositionSide::Long),
            Position::Short => Some(PositionSide::Short),
            Position::Flat => None,
        };
        if target == position {
            return Vec::new();
        }

        let mut orders = Vec::with_capacity(2);
        if position.is_some() {
            orders.push(self.order(bar, OrderAction::Close));
        }
        match target {
            Some(PositionSide::Long) => orders.push(self.order(bar, OrderAction::OpenLong)),
            Some(PositionSide::Short) => orders.push(self.order(bar, OrderAction::OpenShort)),
            None => {}
        }
        orders
    }

    fn parameters(&self) -> HashMap<String, String> {
        HashMap::from([("symbol".to_string(), self.symbol.clone())])
    }
}
