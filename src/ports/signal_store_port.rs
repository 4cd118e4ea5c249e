//! Signal persistence port trait.

use crate::domain::error::AgentError;
use crate::domain::metrics::{PerformanceMetrics, TimeframePerformance, TradeCounts};
use crate::domain::signal::Signal;

pub trait SignalStorePort {
    /// Append one cycle record: a compact row carrying `metrics` and a full
    /// detail row with every indicator value.
    fn store_signal(
        &self,
        signal: &Signal,
        metrics: &PerformanceMetrics,
    ) -> Result<(), AgentError>;

    /// Detail rows, newest first.
    fn latest_trades(&self, limit: usize) -> Result<Vec<Signal>, AgentError>;

    fn latest_signal(&self) -> Result<Option<Signal>, AgentError>;

    /// Running metrics carried by the newest stored record.
    fn performance_metrics(&self) -> Result<PerformanceMetrics, AgentError>;

    fn timeframe_performance(&self) -> Result<Vec<TimeframePerformance>, AgentError>;

    fn trade_counts(&self) -> Result<Vec<TradeCounts>, AgentError>;
}
