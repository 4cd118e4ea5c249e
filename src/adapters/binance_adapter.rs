//! Binance public market data (spot klines) over HTTP.

use std::time::Duration;

use chrono::DateTime;
use serde_json::Value;

use crate::domain::error::AgentError;
use crate::domain::market_feed::{LATEST_LOOKBACK, select_latest};
use crate::domain::ohlcv::Bar;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
/// Largest page the klines endpoint serves.
const MAX_LIMIT: usize = 1000;

pub struct BinanceMarketData {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl BinanceMarketData {
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e: reqwest::Error| AgentError::MarketData {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AgentError> {
        let base_url = config
            .get_string("binance", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url)
    }

    fn klines_url(&self, symbol: &str, timeframe: &str, limit: usize) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={timeframe}&limit={}",
            self.base_url,
            market_symbol(symbol),
            limit.clamp(1, MAX_LIMIT)
        )
    }
}

/// `BTC/USDT` becomes `BTCUSDT`.
pub fn market_symbol(symbol: &str) -> String {
    symbol.replace('/', "").to_uppercase()
}

fn field_f64(kline: &[Value], index: usize) -> f64 {
    match kline.get(index) {
        Some(Value::String(s)) => s.parse().unwrap_or(f64::NAN),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Parse a klines response: arrays of
/// `[open_time_ms, "open", "high", "low", "close", "volume", ...]`.
pub fn parse_klines(body: &str) -> Result<Vec<Bar>, AgentError> {
    let klines: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| AgentError::MarketData {
            reason: format!("unexpected klines response: {e}"),
        })?;

    klines
        .iter()
        .map(|kline| {
            let timestamp = kline
                .first()
                .and_then(Value::as_i64)
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| AgentError::MarketData {
                    reason: "kline without open time".into(),
                })?;
            Ok(Bar {
                timestamp,
                open: field_f64(kline, 1),
                high: field_f64(kline, 2),
                low: field_f64(kline, 3),
                close: field_f64(kline, 4),
                volume: field_f64(kline, 5),
            })
        })
        .collect()
}

impl MarketDataPort for BinanceMarketData {
    fn fetch_window(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<Vec<Bar>, AgentError> {
        let url = self.klines_url(symbol, timeframe, limit);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e: reqwest::Error| AgentError::MarketData {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AgentError::MarketData {
                reason: format!("HTTP {status} for {symbol}"),
            });
        }
        let body = resp.text().map_err(|e: reqwest::Error| AgentError::MarketData {
            reason: e.to_string(),
        })?;
        parse_klines(&body)
    }

    fn fetch_latest(&self, symbol: &str, timeframe: &str) -> Result<Bar, AgentError> {
        let bars = self.fetch_window(symbol, timeframe, LATEST_LOOKBACK)?;
        select_latest(&bars).ok_or_else(|| AgentError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        })
    }
}
