//! Retried market data access with last-known-good fallback.

use tracing::{info, warn};

use crate::domain::error::AgentError;
use crate::domain::ohlcv::Bar;
use crate::domain::retry::RetryPolicy;
use crate::ports::clock_port::Clock;
use crate::ports::market_data_port::MarketDataPort;

/// How many recent bars `fetch_latest` looks through.
pub const LATEST_LOOKBACK: usize = 5;

/// The most recent bar that moved (non-zero body), else the most recent bar.
pub fn select_latest(bars: &[Bar]) -> Option<Bar> {
    bars.iter()
        .rev()
        .find(|b| b.body().abs() > 0.0)
        .or_else(|| bars.last())
        .cloned()
}

pub struct MarketFeed<'a> {
    source: &'a dyn MarketDataPort,
    symbol: String,
    timeframe: String,
    policy: RetryPolicy,
    last_good: Option<Bar>,
}

impl<'a> MarketFeed<'a> {
    pub fn new(
        source: &'a dyn MarketDataPort,
        symbol: &str,
        timeframe: &str,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            policy,
            last_good: None,
        }
    }

    pub fn last_good(&self) -> Option<&Bar> {
        self.last_good.as_ref()
    }

    /// Up to `limit` recent bars. An empty response counts as a failed attempt.
    pub fn window(&mut self, clock: &dyn Clock, limit: usize) -> Result<Vec<Bar>, AgentError> {
        let bars = self.policy.run(clock, "fetch_window", || {
            let bars = self
                .source
                .fetch_window(&self.symbol, &self.timeframe, limit)?;
            if bars.is_empty() {
                return Err(self.no_data());
            }
            Ok(bars)
        })?;
        if let Some(bar) = bars.last().filter(|b| b.has_price()) {
            self.last_good = Some(bar.clone());
        }
        Ok(bars)
    }

    /// The newest bar, falling back to the last good one and then to an
    /// all-NaN bar stamped `now` that callers must skip.
    pub fn latest(&mut self, clock: &dyn Clock) -> Bar {
        let fetched = self.policy.run(clock, "fetch_latest", || {
            let bar = self.source.fetch_latest(&self.symbol, &self.timeframe)?;
            if !bar.has_price() {
                return Err(self.no_data());
            }
            Ok(bar)
        });
        match fetched {
            Ok(bar) => {
                self.last_good = Some(bar.clone());
                bar
            }
            Err(_) => match &self.last_good {
                Some(bar) => {
                    info!(symbol = %self.symbol, "using last valid price data as fallback");
                    bar.clone()
                }
                None => {
                    warn!(symbol = %self.symbol, "no price data and no fallback available");
                    Bar::missing(clock.now())
                }
            },
        }
    }

    fn no_data(&self) -> AgentError {
        AgentError::NoData {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe.clone(),
        }
    }
}
