//! In-process signal store, used when no database is configured.

use std::sync::{Mutex, MutexGuard};

use crate::domain::error::AgentError;
use crate::domain::metrics::{self, PerformanceMetrics, TimeframePerformance, TradeCounts};
use crate::domain::signal::Signal;
use crate::ports::signal_store_port::SignalStorePort;

#[derive(Default)]
struct Records {
    signals: Vec<Signal>,
    metrics: PerformanceMetrics,
}

#[derive(Default)]
pub struct MemorySignalStore {
    records: Mutex<Records>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every stored signal, oldest first.
    pub fn signals(&self) -> Vec<Signal> {
        self.records().signals.clone()
    }

    pub fn len(&self) -> usize {
        self.records().signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalStorePort for MemorySignalStore {
    fn store_signal(
        &self,
        signal: &Signal,
        metrics: &PerformanceMetrics,
    ) -> Result<(), AgentError> {
        let mut records = self.records();
        records.signals.push(signal.clone());
        records.metrics = *metrics;
        Ok(())
    }

    fn latest_trades(&self, limit: usize) -> Result<Vec<Signal>, AgentError> {
        Ok(self.records().signals.iter().rev().take(limit).cloned().collect())
    }

    fn latest_signal(&self) -> Result<Option<Signal>, AgentError> {
        Ok(self.records().signals.last().cloned())
    }

    fn performance_metrics(&self) -> Result<PerformanceMetrics, AgentError> {
        Ok(self.records().metrics)
    }

    fn timeframe_performance(&self) -> Result<Vec<TimeframePerformance>, AgentError> {
        Ok(metrics::timeframe_performance(&self.records().signals))
    }

    fn trade_counts(&self) -> Result<Vec<TradeCounts>, AgentError> {
        Ok(metrics::trade_counts(&self.records().signals))
    }
}
