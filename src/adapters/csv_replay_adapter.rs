//! CSV replay data source.
//!
//! Serves a recorded bar history one bar per `fetch_latest` call, after an
//! initial warm-up window. Expected columns:
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339,
//! `%Y-%m-%d %H:%M:%S` (UTC) or epoch milliseconds. Empty price cells load
//! as missing values.

use crate::domain::error::AgentError;
use crate::domain::ohlcv::Bar;
use crate::ports::market_data_port::MarketDataPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::cell::Cell;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_WARMUP_BARS: usize = 100;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl BarRow {
    fn into_bar(self) -> Result<Bar, AgentError> {
        Ok(Bar {
            timestamp: parse_timestamp(&self.timestamp)?,
            open: self.open.unwrap_or(f64::NAN),
            high: self.high.unwrap_or(f64::NAN),
            low: self.low.unwrap_or(f64::NAN),
            close: self.close.unwrap_or(f64::NAN),
            volume: self.volume.unwrap_or(f64::NAN),
        })
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, AgentError> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    text.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| AgentError::MarketData {
            reason: format!("invalid timestamp '{text}'"),
        })
}

pub struct CsvReplay {
    bars: Vec<Bar>,
    cursor: Cell<usize>,
}

impl CsvReplay {
    pub fn from_path<P: AsRef<Path>>(path: P, warmup_bars: usize) -> Result<Self, AgentError> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv(reader, warmup_bars)
    }

    pub fn from_reader<R: Read>(reader: R, warmup_bars: usize) -> Result<Self, AgentError> {
        Self::from_csv(csv::Reader::from_reader(reader), warmup_bars)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, warmup_bars: usize) -> Result<Self, AgentError> {
        let mut bars = Vec::new();
        for row in reader.deserialize::<BarRow>() {
            bars.push(row?.into_bar()?);
        }
        bars.sort_by_key(|b| b.timestamp);
        let cursor = warmup_bars.min(bars.len());
        Ok(Self {
            bars,
            cursor: Cell::new(cursor),
        })
    }

    /// Bars not yet served by `fetch_latest`.
    pub fn remaining(&self) -> usize {
        self.bars.len() - self.cursor.get()
    }

    /// Timestamp of the newest bar already visible, or of the first bar.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        let index = self.cursor.get().saturating_sub(1);
        self.bars.get(index).map(|b| b.timestamp)
    }

    fn no_data(symbol: &str, timeframe: &str) -> AgentError {
        AgentError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }
}

impl MarketDataPort for CsvReplay {
    fn fetch_window(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, AgentError> {
        let visible = &self.bars[..self.cursor.get()];
        if visible.is_empty() {
            return Err(Self::no_data(symbol, timeframe));
        }
        let skip = visible.len().saturating_sub(limit);
        Ok(visible[skip..].to_vec())
    }

    fn fetch_latest(&self, symbol: &str, timeframe: &str) -> Result<Bar, AgentError> {
        let index = self.cursor.get();
        let bar = self
            .bars
            .get(index)
            .cloned()
            .ok_or_else(|| Self::no_data(symbol, timeframe))?;
        self.cursor.set(index + 1);
        Ok(bar)
    }
}
