//! Trade statistics and the text reports built from them.

use chrono::{DateTime, Utc};

use crate::domain::decision::Action;
use crate::domain::signal::Signal;

/// Running counts stored alongside every compact signal row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerformanceMetrics {
    pub wins: u64,
    pub losses: u64,
    pub holds: u64,
    pub buys: u64,
    pub sells: u64,
    pub total_winning: f64,
    pub total_losing: f64,
}

impl PerformanceMetrics {
    pub fn from_signals<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> Self {
        let mut metrics = Self::default();
        for signal in signals {
            metrics.record(signal.action, signal.profit);
        }
        metrics
    }

    pub fn record(&mut self, action: Action, profit: f64) {
        match action {
            Action::Hold => self.holds += 1,
            Action::Buy => self.buys += 1,
            Action::Sell => {
                self.sells += 1;
                if profit > 0.0 {
                    self.wins += 1;
                    self.total_winning += profit;
                } else if profit < 0.0 {
                    self.losses += 1;
                    self.total_losing += profit;
                }
            }
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.total_winning + self.total_losing
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeframePerformance {
    pub timeframe: String,
    pub first_sell: Option<DateTime<Utc>>,
    pub last_sell: Option<DateTime<Utc>>,
    pub win_trades: u64,
    pub loss_trades: u64,
    pub total_profit: f64,
    pub total_return_profit: f64,
}

impl TimeframePerformance {
    fn empty(timeframe: &str) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            first_sell: None,
            last_sell: None,
            win_trades: 0,
            loss_trades: 0,
            total_profit: 0.0,
            total_return_profit: 0.0,
        }
    }

    /// Hours between the first and last sell.
    pub fn duration_hours(&self) -> Option<f64> {
        match (self.first_sell, self.last_sell) {
            (Some(first), Some(last)) => Some((last - first).num_seconds() as f64 / 3600.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeCounts {
    pub timeframe: String,
    pub total: u64,
    pub buys: u64,
    pub sells: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_profit: f64,
    pub total_return_profit: f64,
}

impl TradeCounts {
    fn empty(timeframe: &str) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            total: 0,
            buys: 0,
            sells: 0,
            wins: 0,
            losses: 0,
            total_profit: 0.0,
            total_return_profit: 0.0,
        }
    }
}

/// Index of `timeframe` in `groups`, appending a new group on first sight.
fn group_index<T>(
    groups: &mut Vec<T>,
    timeframe: &str,
    name: impl Fn(&T) -> &str,
    empty: impl Fn(&str) -> T,
) -> usize {
    match groups.iter().position(|g| name(g) == timeframe) {
        Some(index) => index,
        None => {
            groups.push(empty(timeframe));
            groups.len() - 1
        }
    }
}

/// Sell statistics per timeframe, in order of first appearance.
pub fn timeframe_performance(signals: &[Signal]) -> Vec<TimeframePerformance> {
    let mut groups: Vec<TimeframePerformance> = Vec::new();
    for signal in signals {
        let index = group_index(
            &mut groups,
            &signal.timeframe,
            |g| g.timeframe.as_str(),
            TimeframePerformance::empty,
        );
        if signal.action != Action::Sell {
            continue;
        }
        let group = &mut groups[index];
        group.first_sell = Some(group.first_sell.map_or(signal.time, |t| t.min(signal.time)));
        group.last_sell = Some(group.last_sell.map_or(signal.time, |t| t.max(signal.time)));
        if signal.profit > 0.0 {
            group.win_trades += 1;
        } else if signal.profit < 0.0 {
            group.loss_trades += 1;
        }
        group.total_profit += signal.profit;
        group.total_return_profit += signal.return_profit;
    }
    groups
}

/// Record counts per timeframe, in order of first appearance.
pub fn trade_counts(signals: &[Signal]) -> Vec<TradeCounts> {
    let mut groups: Vec<TradeCounts> = Vec::new();
    for signal in signals {
        let index = group_index(
            &mut groups,
            &signal.timeframe,
            |g| g.timeframe.as_str(),
            TradeCounts::empty,
        );
        let group = &mut groups[index];
        group.total += 1;
        group.total_profit += signal.profit;
        group.total_return_profit += signal.return_profit;
        match signal.action {
            Action::Buy => group.buys += 1,
            Action::Sell => {
                group.sells += 1;
                if signal.profit > 0.0 {
                    group.wins += 1;
                } else if signal.profit < 0.0 {
                    group.losses += 1;
                }
            }
            Action::Hold => {}
        }
    }
    groups
}

pub fn format_performance(groups: &[TimeframePerformance]) -> String {
    let mut out = String::from("Performance Statistics by Timeframe:\n");
    for group in groups {
        let duration = group
            .duration_hours()
            .map_or_else(|| "N/A".to_string(), |h| format!("{h:.2}"));
        out.push_str(&format!(
            "\nTimeframe: {}\nDuration (hours): {}\nWin Trades: {}\nLoss Trades: {}\n\
             Total Profit: {:.2}\nTotal Return Profit: {:.2}\n",
            group.timeframe,
            duration,
            group.win_trades,
            group.loss_trades,
            group.total_profit,
            group.total_return_profit,
        ));
    }
    out
}

pub fn format_trade_counts(groups: &[TradeCounts]) -> String {
    let mut out = String::from("Trade Counts by Timeframe:\n");
    for group in groups {
        out.push_str(&format!(
            "\nTimeframe: {}\nTotal Trades: {}\nBuy Trades: {}\nSell Trades: {}\n\
             Win Trades: {}\nLoss Trades: {}\nTotal Profit: {:.2}\nTotal Return Profit: {:.2}\n",
            group.timeframe,
            group.total,
            group.buys,
            group.sells,
            group.wins,
            group.losses,
            group.total_profit,
            group.total_return_profit,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::{IndicatorSnapshot, StrategyTag};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn signal(minute: i64, timeframe: &str, action: Action, profit: f64, ret: f64) -> Signal {
        Signal {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            action,
            symbol: "BTC/USDT".into(),
            price: 100.0,
            open_price: 100.0,
            close_price: 100.0,
            volume: 1.0,
            percent_change: 0.0,
            stop_loss: None,
            take_profit: None,
            profit,
            total_profit: 0.0,
            return_profit: ret,
            total_return_profit: 0.0,
            indicators: IndicatorSnapshot::default(),
            message: String::new(),
            timeframe: timeframe.into(),
            order_id: None,
            strategy: StrategyTag::Primary,
        }
    }

    fn history() -> Vec<Signal> {
        vec![
            signal(0, "1m", Action::Hold, 0.0, 0.0),
            signal(1, "1m", Action::Buy, 0.0, 0.0),
            signal(2, "1m", Action::Sell, 4.0, 0.0),
            signal(3, "5m", Action::Buy, 0.0, 0.0),
            signal(4, "1m", Action::Buy, 0.0, 0.0),
            signal(92, "1m", Action::Sell, -1.5, 2.0),
        ]
    }

    #[test]
    fn metrics_count_actions_and_profit() {
        let metrics = PerformanceMetrics::from_signals(&history());
        assert_eq!(metrics.holds, 1);
        assert_eq!(metrics.buys, 3);
        assert_eq!(metrics.sells, 2);
        assert_eq!(metrics.wins, 1);
        assert_eq!(metrics.losses, 1);
        assert_relative_eq!(metrics.total_winning, 4.0);
        assert_relative_eq!(metrics.total_losing, -1.5);
        assert_relative_eq!(metrics.net_profit(), 2.5);
    }

    #[test]
    fn breakeven_sell_is_neither_win_nor_loss() {
        let mut metrics = PerformanceMetrics::default();
        metrics.record(Action::Sell, 0.0);
        assert_eq!(metrics.sells, 1);
        assert_eq!(metrics.wins + metrics.losses, 0);
    }

    #[test]
    fn performance_grouped_by_timeframe() {
        let groups = timeframe_performance(&history());
        assert_eq!(groups.len(), 2);
        let one = &groups[0];
        assert_eq!(one.timeframe, "1m");
        assert_eq!(one.win_trades, 1);
        assert_eq!(one.loss_trades, 1);
        assert_relative_eq!(one.total_profit, 2.5);
        assert_relative_eq!(one.total_return_profit, 2.0);
        assert_relative_eq!(one.duration_hours().unwrap(), 1.5);

        let five = &groups[1];
        assert_eq!(five.timeframe, "5m");
        assert_eq!(five.duration_hours(), None);
    }

    #[test]
    fn counts_grouped_by_timeframe() {
        let groups = trade_counts(&history());
        assert_eq!(groups[0].total, 5);
        assert_eq!(groups[0].buys, 2);
        assert_eq!(groups[0].sells, 2);
        assert_eq!(groups[1].total, 1);
        assert_eq!(groups[1].buys, 1);
    }

    #[test]
    fn performance_report_text() {
        let text = format_performance(&timeframe_performance(&history()));
        assert!(text.starts_with("Performance Statistics by Timeframe:\n"));
        assert!(text.contains("Timeframe: 1m\nDuration (hours): 1.50\nWin Trades: 1\nLoss Trades: 1\n"));
        assert!(text.contains("Total Profit: 2.50\nTotal Return Profit: 2.00\n"));
        assert!(text.contains("Timeframe: 5m\nDuration (hours): N/A\n"));
    }

    #[test]
    fn count_report_text() {
        let text = format_trade_counts(&trade_counts(&history()));
        assert!(text.starts_with("Trade Counts by Timeframe:\n"));
        assert!(text.contains("Timeframe: 5m\nTotal Trades: 1\nBuy Trades: 1\nSell Trades: 0\n"));
    }

    #[test]
    fn empty_reports_have_only_headers() {
        assert_eq!(format_performance(&[]), "Performance Statistics by Timeframe:\n");
        assert_eq!(format_trade_counts(&[]), "Trade Counts by Timeframe:\n");
    }
}
