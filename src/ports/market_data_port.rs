//! OHLCV source port trait.

use crate::domain::error::AgentError;
use crate::domain::ohlcv::Bar;

pub trait MarketDataPort {
    /// Most recent `limit` bars, oldest first.
    fn fetch_window(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, AgentError>;

    /// The bar a new cycle should act on.
    fn fetch_latest(&self, symbol: &str, timeframe: &str) -> Result<Bar, AgentError>;
}
