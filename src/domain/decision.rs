//! Buy/sell/hold decision rules.
//!
//! Rules are an ordered list evaluated top to bottom; the first rule whose
//! predicate matches decides the action. Exit rules only apply while long and
//! entry rules only while flat, and [`guard`] enforces the same invariant on
//! whatever action comes out.
//!
//! Non-finite indicator values read as 0.0.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::domain::indicator::EnrichedBar;
use crate::domain::position::{PositionState, ProtectiveLevels};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Hold => "hold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "hold" => Ok(Action::Hold),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            stop_loss_pct: 2.0,
            take_profit_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleId {
    StopLoss,
    TakeProfit,
    SupertrendExit,
    KdjExit,
    SupertrendEntry,
    KdjEntry,
}

impl RuleId {
    /// Suffix appended to the cycle message when this rule closes a position.
    pub fn annotation(&self) -> &'static str {
        match self {
            RuleId::StopLoss => " (Stop-Loss)",
            RuleId::TakeProfit => " (Take-Profit)",
            _ => "",
        }
    }
}

/// Everything a rule predicate may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub bar: &'a EnrichedBar,
    pub position: PositionState,
    pub levels: Option<ProtectiveLevels>,
}

impl RuleInput<'_> {
    fn close(&self) -> f64 {
        self.bar.bar.close
    }

    fn j(&self) -> f64 {
        neutral(self.bar.kdj_j)
    }

    fn d(&self) -> f64 {
        neutral(self.bar.kdj_d)
    }

    fn ema_fast(&self) -> f64 {
        neutral(self.bar.ema_fast)
    }

    fn ema_slow(&self) -> f64 {
        neutral(self.bar.ema_slow)
    }

    fn rsi(&self) -> f64 {
        neutral(self.bar.rsi)
    }

    fn trend_up(&self) -> bool {
        self.bar.supertrend_trend
    }
}

fn neutral(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

pub struct Rule {
    pub id: RuleId,
    pub action: Action,
    pub applies: fn(&RuleInput) -> bool,
}

pub const RULES: [Rule; 6] = [
    Rule {
        id: RuleId::StopLoss,
        action: Action::Sell,
        applies: |input| {
            input
                .levels
                .is_some_and(|levels| levels.should_stop_loss(input.close()))
        },
    },
    Rule {
        id: RuleId::TakeProfit,
        action: Action::Sell,
        applies: |input| {
            input
                .levels
                .is_some_and(|levels| levels.should_take_profit(input.close()))
        },
    },
    Rule {
        id: RuleId::SupertrendExit,
        action: Action::Sell,
        applies: |input| {
            input.position.is_long()
                && input.trend_up()
                && input.j() > input.d()
                && input.j() > 112.0
        },
    },
    Rule {
        id: RuleId::KdjExit,
        action: Action::Sell,
        applies: |input| {
            input.position.is_long()
                && input.j() > input.d()
                && input.j() > 100.0
                && input.ema_fast() > input.ema_slow()
                && input.rsi() > 60.0
        },
    },
    Rule {
        id: RuleId::SupertrendEntry,
        action: Action::Buy,
        applies: |input| {
            !input.position.is_long()
                && !input.trend_up()
                && input.j() < input.d()
                && input.j() < -6.0
        },
    },
    Rule {
        id: RuleId::KdjEntry,
        action: Action::Buy,
        applies: |input| {
            !input.position.is_long()
                && input.j() < input.d()
                && input.j() < -5.0
                && input.ema_fast() < input.ema_slow()
                && input.rsi() < 19.0
        },
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub rule: Option<RuleId>,
    /// Present while long.
    pub levels: Option<ProtectiveLevels>,
}

impl Decision {
    pub fn hold(levels: Option<ProtectiveLevels>) -> Self {
        Self {
            action: Action::Hold,
            rule: None,
            levels,
        }
    }
}

pub fn decide(bar: &EnrichedBar, position: PositionState, thresholds: &Thresholds) -> Decision {
    let levels = position.entry_price().map(|entry| {
        ProtectiveLevels::from_entry(entry, thresholds.stop_loss_pct, thresholds.take_profit_pct)
    });
    let input = RuleInput {
        bar,
        position,
        levels,
    };

    let Some(rule) = RULES.iter().find(|rule| (rule.applies)(&input)) else {
        return Decision::hold(levels);
    };

    let action = guard(rule.action, position);
    if action != rule.action {
        return Decision::hold(levels);
    }

    debug!(
        rule = ?rule.id,
        %action,
        close = bar.bar.close,
        j = input.j(),
        d = input.d(),
        "decision rule matched"
    );
    Decision {
        action,
        rule: Some(rule.id),
        levels,
    }
}

/// No buy while long, no sell while flat.
pub fn guard(action: Action, position: PositionState) -> Action {
    match (action, position.is_long()) {
        (Action::Buy, true) => {
            debug!("prevented consecutive buy");
            Action::Hold
        }
        (Action::Sell, false) => {
            debug!("prevented sell without open position");
            Action::Hold
        }
        (action, _) => action,
    }
}
