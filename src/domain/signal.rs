//! Per-cycle decision records.
//!
//! A [`Signal`] is built once per cycle by [`SignalAssembler`] and then only
//! read: stored, rendered into notification text, reported on.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::decision::Action;
use crate::domain::indicator::EnrichedBar;
use crate::domain::ohlcv::Bar;
use crate::domain::position::ProtectiveLevels;

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyTag {
    Primary,
    Startup,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Primary => "primary",
            StrategyTag::Startup => "startup",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(StrategyTag::Primary),
            "startup" => Ok(StrategyTag::Startup),
            other => Err(format!("unknown strategy tag '{other}'")),
        }
    }
}

/// Indicator values of the newest enriched bar, non-finite values zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub kdj_k: f64,
    pub kdj_d: f64,
    pub kdj_j: f64,
    pub body: f64,
    pub ema_spread: f64,
    pub macd_spread: f64,
    pub kdj_spread: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub macd_hollow: f64,
    pub ema_fast_delta: f64,
    pub supertrend: f64,
    pub supertrend_trend: bool,
    pub stoch_rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub obv: f64,
}

impl IndicatorSnapshot {
    pub fn from_enriched(bar: &EnrichedBar) -> Self {
        Self {
            ema_fast: finite_or_zero(bar.ema_fast),
            ema_slow: finite_or_zero(bar.ema_slow),
            rsi: finite_or_zero(bar.rsi),
            kdj_k: finite_or_zero(bar.kdj_k),
            kdj_d: finite_or_zero(bar.kdj_d),
            kdj_j: finite_or_zero(bar.kdj_j),
            body: finite_or_zero(bar.body),
            ema_spread: finite_or_zero(bar.ema_spread),
            macd_spread: finite_or_zero(bar.macd_spread),
            kdj_spread: finite_or_zero(bar.kdj_spread),
            macd: finite_or_zero(bar.macd),
            macd_signal: finite_or_zero(bar.macd_signal),
            macd_hist: finite_or_zero(bar.macd_hist),
            macd_hollow: finite_or_zero(bar.macd_hollow),
            ema_fast_delta: finite_or_zero(bar.ema_fast_delta),
            supertrend: finite_or_zero(bar.supertrend),
            supertrend_trend: bar.supertrend_trend,
            stoch_rsi: finite_or_zero(bar.stoch_rsi),
            stoch_k: finite_or_zero(bar.stoch_k),
            stoch_d: finite_or_zero(bar.stoch_d),
            obv: finite_or_zero(bar.obv),
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub action: Action,
    pub symbol: String,
    pub price: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub percent_change: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub profit: f64,
    pub total_profit: f64,
    pub return_profit: f64,
    pub total_return_profit: f64,
    pub indicators: IndicatorSnapshot,
    pub message: String,
    pub timeframe: String,
    pub order_id: Option<String>,
    pub strategy: StrategyTag,
}

impl Signal {
    /// Outbound message text.
    pub fn notification_text(&self) -> String {
        format!(
            "Time: {}\nTimeframe: {}\nStrategy: {}\nMsg: {}\nPrice: {:.2}\nDiff: {:.2}\nOrder ID: {}",
            self.time.format(TIME_FORMAT),
            self.timeframe,
            self.strategy,
            self.message,
            self.price,
            self.indicators.body,
            self.order_id.as_deref().unwrap_or("N/A"),
        )
    }
}

/// Everything one cycle contributes to its record.
#[derive(Debug, Clone)]
pub struct CycleOutcome<'a> {
    pub time: DateTime<Utc>,
    pub action: Action,
    pub price: f64,
    pub latest: &'a Bar,
    pub window: &'a [EnrichedBar],
    pub levels: Option<ProtectiveLevels>,
    pub profit: f64,
    pub total_profit: f64,
    pub return_profit: f64,
    pub total_return_profit: f64,
    pub message: String,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignalAssembler {
    symbol: String,
    timeframe: String,
}

impl SignalAssembler {
    pub fn new(symbol: &str, timeframe: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }

    pub fn assemble(&self, outcome: CycleOutcome<'_>) -> Signal {
        let indicators = outcome
            .window
            .last()
            .map(IndicatorSnapshot::from_enriched)
            .unwrap_or_default();

        Signal {
            time: outcome.time,
            action: outcome.action,
            symbol: self.symbol.clone(),
            price: finite_or_zero(outcome.price),
            open_price: finite_or_zero(outcome.latest.open),
            close_price: finite_or_zero(outcome.latest.close),
            volume: finite_or_zero(outcome.latest.volume),
            percent_change: percent_change(outcome.price, outcome.window),
            stop_loss: outcome.levels.map(|l| l.stop_loss),
            take_profit: outcome.levels.map(|l| l.take_profit),
            profit: finite_or_zero(outcome.profit),
            total_profit: finite_or_zero(outcome.total_profit),
            return_profit: finite_or_zero(outcome.return_profit),
            total_return_profit: finite_or_zero(outcome.total_return_profit),
            indicators,
            message: outcome.message,
            timeframe: self.timeframe.clone(),
            order_id: outcome.order_id,
            strategy: StrategyTag::Primary,
        }
    }

    /// The hold record written once when the agent boots.
    pub fn startup(&self, time: DateTime<Utc>) -> Signal {
        Signal {
            time,
            action: Action::Hold,
            symbol: self.symbol.clone(),
            price: 0.0,
            open_price: 0.0,
            close_price: 0.0,
            volume: 0.0,
            percent_change: 0.0,
            stop_loss: None,
            take_profit: None,
            profit: 0.0,
            total_profit: 0.0,
            return_profit: 0.0,
            total_return_profit: 0.0,
            indicators: IndicatorSnapshot::default(),
            message: format!("Initializing agent for {}", self.symbol),
            timeframe: self.timeframe.clone(),
            order_id: None,
            strategy: StrategyTag::Startup,
        }
    }
}

/// Change of `price` against the previous bar's close, in percent.
pub fn percent_change(price: f64, window: &[EnrichedBar]) -> f64 {
    let Some(previous) = window.len().checked_sub(2).map(|i| window[i].bar.close) else {
        return 0.0;
    };
    if previous == 0.0 || !previous.is_finite() {
        return 0.0;
    }
    finite_or_zero((price - previous) / previous * 100.0)
}
