#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use kdjtrader::adapters::clock::SimulatedClock;
use kdjtrader::adapters::memory_signal_store::MemorySignalStore;
use kdjtrader::domain::agent::AgentConfig;
use kdjtrader::domain::error::AgentError;
use kdjtrader::domain::metrics::{PerformanceMetrics, TimeframePerformance, TradeCounts};
pub use kdjtrader::domain::ohlcv::Bar;
use kdjtrader::domain::retry::RetryPolicy;
use kdjtrader::domain::schedule::Timeframe;
use kdjtrader::domain::signal::Signal;
use kdjtrader::ports::command_port::CommandPort;
use kdjtrader::ports::execution_port::ExecutionPort;
use kdjtrader::ports::market_data_port::MarketDataPort;
use kdjtrader::ports::notifier_port::NotifierPort;
use kdjtrader::ports::signal_store_port::SignalStorePort;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const SYMBOL: &str = "BTC/USDT";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn clock() -> Arc<SimulatedClock> {
    Arc::new(SimulatedClock::new(t0()))
}

/// Minute bar with a half-point wick either side of the body.
pub fn make_bar(minute: i64, open: f64, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::minutes(minute),
        open,
        high: open.max(close) + 0.5,
        low: open.min(close) - 0.5,
        close,
        volume: 10.0,
    }
}

/// `count` bars sitting at `price`, ending one minute before `t0`.
pub fn flat_bars(count: usize, price: f64) -> Vec<Bar> {
    (0..count)
        .map(|i| make_bar(i as i64 - count as i64, price, price))
        .collect()
}

/// A bar that opens at the high and falls to `close`.
pub fn falling_bar(minute: i64, open: f64, close: f64) -> Bar {
    Bar {
        timestamp: t0() + Duration::minutes(minute),
        open,
        high: open,
        low: close - 0.5,
        close,
        volume: 10.0,
    }
}

/// Agent config with instant retries so tests never wait.
pub fn agent_config() -> AgentConfig {
    let instant = |attempts| RetryPolicy::new(attempts, std::time::Duration::ZERO);
    AgentConfig {
        fetch_retry: instant(2),
        store_retry: instant(3),
        notify_retry: instant(2),
        ..AgentConfig::new(SYMBOL, Timeframe::parse("1m", 60), 15.0)
    }
}

/// A fixed seed window plus latest bars queued by the test.
pub struct ScriptedMarket {
    pub window: Vec<Bar>,
    latest: RefCell<VecDeque<Bar>>,
    pub window_calls: Cell<u32>,
}

impl ScriptedMarket {
    pub fn new(window: Vec<Bar>) -> Self {
        Self {
            window,
            latest: RefCell::new(VecDeque::new()),
            window_calls: Cell::new(0),
        }
    }

    pub fn push(&self, bar: Bar) {
        self.latest.borrow_mut().push_back(bar);
    }
}

impl MarketDataPort for ScriptedMarket {
    fn fetch_window(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, AgentError> {
        self.window_calls.set(self.window_calls.get() + 1);
        if self.window.is_empty() {
            return Err(AgentError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let skip = self.window.len().saturating_sub(limit);
        Ok(self.window[skip..].to_vec())
    }

    fn fetch_latest(&self, symbol: &str, timeframe: &str) -> Result<Bar, AgentError> {
        self.latest
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| AgentError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Buy(f64),
    Sell(f64),
}

/// Venue holding one base balance. Every call fails while `failing` is set.
pub struct MockVenue {
    pub base_balance: Cell<f64>,
    pub orders: RefCell<Vec<Order>>,
    pub failing: Cell<bool>,
}

impl MockVenue {
    pub fn new(base_balance: f64) -> Self {
        Self {
            base_balance: Cell::new(base_balance),
            orders: RefCell::new(Vec::new()),
            failing: Cell::new(false),
        }
    }

    fn check(&self) -> Result<(), AgentError> {
        if self.failing.get() {
            return Err(AgentError::Execution {
                reason: "venue unavailable".into(),
            });
        }
        Ok(())
    }

    fn order_id(&self) -> String {
        format!("order-{}", self.orders.borrow().len())
    }
}

impl ExecutionPort for MockVenue {
    fn quantity_precision(&self, _symbol: &str) -> Result<u32, AgentError> {
        self.check()?;
        Ok(5)
    }

    fn market_buy(&self, _symbol: &str, quantity: f64) -> Result<String, AgentError> {
        self.check()?;
        self.base_balance.set(self.base_balance.get() + quantity);
        self.orders.borrow_mut().push(Order::Buy(quantity));
        Ok(self.order_id())
    }

    fn market_sell(&self, _symbol: &str, quantity: f64) -> Result<String, AgentError> {
        self.check()?;
        self.base_balance.set(self.base_balance.get() - quantity);
        self.orders.borrow_mut().push(Order::Sell(quantity));
        Ok(self.order_id())
    }

    fn free_balance(&self, _asset: &str) -> Result<f64, AgentError> {
        self.check()?;
        Ok(self.base_balance.get())
    }
}

/// Memory store whose first `failures` writes fail.
pub struct FlakyStore {
    pub inner: MemorySignalStore,
    failures: Cell<u32>,
    pub attempts: Cell<u32>,
}

impl FlakyStore {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: MemorySignalStore::new(),
            failures: Cell::new(failures),
            attempts: Cell::new(0),
        }
    }
}

impl SignalStorePort for FlakyStore {
    fn store_signal(
        &self,
        signal: &Signal,
        metrics: &PerformanceMetrics,
    ) -> Result<(), AgentError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(AgentError::Database {
                reason: "disk full".into(),
            });
        }
        self.inner.store_signal(signal, metrics)
    }

    fn latest_trades(&self, limit: usize) -> Result<Vec<Signal>, AgentError> {
        self.inner.latest_trades(limit)
    }

    fn latest_signal(&self) -> Result<Option<Signal>, AgentError> {
        self.inner.latest_signal()
    }

    fn performance_metrics(&self) -> Result<PerformanceMetrics, AgentError> {
        self.inner.performance_metrics()
    }

    fn timeframe_performance(&self) -> Result<Vec<TimeframePerformance>, AgentError> {
        self.inner.timeframe_performance()
    }

    fn trade_counts(&self) -> Result<Vec<TradeCounts>, AgentError> {
        self.inner.trade_counts()
    }
}

/// Commands queued by the test, replies captured.
#[derive(Default)]
pub struct ScriptedCommands {
    pending: RefCell<Vec<String>>,
    pub replies: RefCell<Vec<String>>,
}

impl ScriptedCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, text: &str) {
        self.pending.borrow_mut().push(text.to_string());
    }

    pub fn take_replies(&self) -> Vec<String> {
        std::mem::take(&mut *self.replies.borrow_mut())
    }
}

impl CommandPort for ScriptedCommands {
    fn poll(&self) -> Result<Vec<String>, AgentError> {
        Ok(std::mem::take(&mut *self.pending.borrow_mut()))
    }

    fn reply(&self, text: &str) -> Result<(), AgentError> {
        self.replies.borrow_mut().push(text.to_string());
        Ok(())
    }
}

/// Notifier writing into a shared log the test keeps a handle to.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotifierPort for RecordingNotifier {
    fn send(&self, text: &str) -> Result<(), AgentError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
