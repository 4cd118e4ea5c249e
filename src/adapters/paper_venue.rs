//! Paper trading venue.
//!
//! Fills every market order instantly at the last marked price, against an
//! in-memory quote and base balance. [`MarkingSource`] keeps the mark in step
//! with the bars the agent sees.

use std::sync::{Mutex, MutexGuard};

use crate::domain::error::AgentError;
use crate::domain::ohlcv::Bar;
use crate::domain::sizing::base_asset;
use crate::ports::config_port::ConfigPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::market_data_port::MarketDataPort;

pub const DEFAULT_PRECISION: u32 = 5;
pub const DEFAULT_QUOTE_BALANCE: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
struct Book {
    quote: f64,
    base: f64,
    last_price: f64,
    next_order: u64,
}

pub struct PaperVenue {
    symbol: String,
    precision: u32,
    book: Mutex<Book>,
}

impl PaperVenue {
    pub fn new(symbol: &str, quote_balance: f64, precision: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            precision,
            book: Mutex::new(Book {
                quote: quote_balance,
                base: 0.0,
                last_price: f64::NAN,
                next_order: 1,
            }),
        }
    }

    pub fn from_config(symbol: &str, config: &dyn ConfigPort) -> Self {
        let precision = config
            .get_int("paper", "precision", i64::from(DEFAULT_PRECISION))
            .clamp(0, 12) as u32;
        let quote = config.get_double("paper", "quote_balance", DEFAULT_QUOTE_BALANCE);
        Self::new(symbol, quote, precision)
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Price used for the next fill.
    pub fn mark(&self, price: f64) {
        self.book().last_price = price;
    }

    pub fn quote_balance(&self) -> f64 {
        self.book().quote
    }

    pub fn base_balance(&self) -> f64 {
        self.book().base
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), AgentError> {
        if symbol == self.symbol {
            Ok(())
        } else {
            Err(AgentError::Execution {
                reason: format!("paper venue trades {} only, not {symbol}", self.symbol),
            })
        }
    }

    fn fill_price(book: &Book) -> Result<f64, AgentError> {
        if book.last_price.is_finite() && book.last_price > 0.0 {
            Ok(book.last_price)
        } else {
            Err(AgentError::Execution {
                reason: "no mark price for paper fill".into(),
            })
        }
    }

    fn order_id(book: &mut Book) -> String {
        let id = format!("paper-{}", book.next_order);
        book.next_order += 1;
        id
    }
}

impl ExecutionPort for PaperVenue {
    fn quantity_precision(&self, symbol: &str) -> Result<u32, AgentError> {
        self.check_symbol(symbol)?;
        Ok(self.precision)
    }

    fn market_buy(&self, symbol: &str, quantity: f64) -> Result<String, AgentError> {
        self.check_symbol(symbol)?;
        let mut book = self.book();
        let cost = quantity * Self::fill_price(&book)?;
        if quantity <= 0.0 || cost > book.quote {
            return Err(AgentError::Execution {
                reason: format!("insufficient quote balance for {quantity} at cost {cost:.2}"),
            });
        }
        book.quote -= cost;
        book.base += quantity;
        Ok(Self::order_id(&mut book))
    }

    fn market_sell(&self, symbol: &str, quantity: f64) -> Result<String, AgentError> {
        self.check_symbol(symbol)?;
        let mut book = self.book();
        let price = Self::fill_price(&book)?;
        if quantity <= 0.0 || quantity > book.base + 1e-12 {
            return Err(AgentError::Execution {
                reason: format!("insufficient base balance to sell {quantity}"),
            });
        }
        book.base = (book.base - quantity).max(0.0);
        book.quote += quantity * price;
        Ok(Self::order_id(&mut book))
    }

    fn free_balance(&self, asset: &str) -> Result<f64, AgentError> {
        let book = self.book();
        if asset == base_asset(&self.symbol) {
            Ok(book.base)
        } else {
            Ok(book.quote)
        }
    }
}

/// Market data that marks the paper venue with every bar it hands out.
pub struct MarkingSource<'a> {
    source: &'a dyn MarketDataPort,
    venue: &'a PaperVenue,
}

impl<'a> MarkingSource<'a> {
    pub fn new(source: &'a dyn MarketDataPort, venue: &'a PaperVenue) -> Self {
        Self { source, venue }
    }

    fn mark(&self, bar: &Bar) {
        if bar.has_price() {
            self.venue.mark(bar.close);
        }
    }
}

impl MarketDataPort for MarkingSource<'_> {
    fn fetch_window(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, AgentError> {
        let bars = self.source.fetch_window(symbol, timeframe, limit)?;
        if let Some(bar) = bars.last() {
            self.mark(bar);
        }
        Ok(bars)
    }

    fn fetch_latest(&self, symbol: &str, timeframe: &str) -> Result<Bar, AgentError> {
        let bar = self.source.fetch_latest(symbol, timeframe)?;
        self.mark(&bar);
        Ok(bar)
    }
}
