//! Secondary "return profit" bookkeeping.
//!
//! The tracker shadows primary buys and sells with its own position. It only
//! re-enters after a profitable primary sell; otherwise the buy is recorded as
//! paused. A primary sell always updates the gate, whether or not a tracking
//! position was open. If the primary never posts another profitable sell the
//! tracker stays paused for the rest of the process.

use crate::domain::decision::Action;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DualStrategyState {
    pub last_sell_profit: f64,
    pub has_open_tracking_buy: bool,
    pub tracking_entry_price: f64,
    pub cumulative_return_profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerOutcome {
    Opened { entry_price: f64 },
    PausedBuy,
    Closed { return_profit: f64 },
    PausedSell,
    Unchanged,
}

impl TrackerOutcome {
    pub fn return_profit(&self) -> f64 {
        match self {
            TrackerOutcome::Closed { return_profit } => *return_profit,
            _ => 0.0,
        }
    }

    pub fn message_suffix(&self) -> String {
        match self {
            TrackerOutcome::PausedBuy => " (Paused Buy2)".to_string(),
            TrackerOutcome::Closed { return_profit } => {
                format!(", Return Profit: {return_profit:.2}")
            }
            TrackerOutcome::PausedSell => " (Paused Sell2)".to_string(),
            TrackerOutcome::Opened { .. } | TrackerOutcome::Unchanged => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DualStrategyTracker {
    state: DualStrategyState,
}

impl DualStrategyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DualStrategyState {
        &self.state
    }

    pub fn cumulative_return_profit(&self) -> f64 {
        self.state.cumulative_return_profit
    }

    /// Feed one committed primary action.
    pub fn record(&mut self, action: Action, price: f64, primary_profit: f64) -> TrackerOutcome {
        match action {
            Action::Buy => self.on_buy(price),
            Action::Sell => self.on_sell(price, primary_profit),
            Action::Hold => TrackerOutcome::Unchanged,
        }
    }

    pub fn on_buy(&mut self, price: f64) -> TrackerOutcome {
        if self.state.last_sell_profit > 0.0 {
            self.state.has_open_tracking_buy = true;
            self.state.tracking_entry_price = price;
            TrackerOutcome::Opened { entry_price: price }
        } else {
            TrackerOutcome::PausedBuy
        }
    }

    pub fn on_sell(&mut self, price: f64, primary_profit: f64) -> TrackerOutcome {
        self.state.last_sell_profit = primary_profit;
        if !self.state.has_open_tracking_buy {
            return TrackerOutcome::PausedSell;
        }

        let return_profit = price - self.state.tracking_entry_price;
        self.state.cumulative_return_profit += return_profit;
        self.state.has_open_tracking_buy = false;
        TrackerOutcome::Closed { return_profit }
    }
}
