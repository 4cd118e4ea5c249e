//! Technical indicator pipeline.
//!
//! [`enrich`] turns a bounded window of bars into [`EnrichedBar`]s carrying every
//! derived series the decision rules read. Each value at index `i` is computed
//! from bars `0..=i` only. Short windows still get a value for every bar:
//! rolling windows shrink to what is available and undefined ratios fall back
//! to neutral defaults.

pub mod ema;
pub mod kdj;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod stoch_rsi;
pub mod supertrend;

use std::time::Instant;

use tracing::{debug, error};

use crate::domain::error::AgentError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub kdj_k: f64,
    pub kdj_d: f64,
    pub kdj_j: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub macd_hollow: f64,
    pub supertrend: f64,
    pub supertrend_trend: bool,
    pub stoch_rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub obv: f64,
    /// close - open
    pub body: f64,
    /// ema_fast - ema_slow
    pub ema_spread: f64,
    /// macd - macd_signal
    pub macd_spread: f64,
    /// kdj_j - kdj_d
    pub kdj_spread: f64,
    /// ema_fast[i-1] - ema_fast[i]
    pub ema_fast_delta: f64,
    /// false when the pipeline could not derive indicators for this bar
    pub enriched: bool,
}

impl EnrichedBar {
    /// The bar with every derived field at its neutral default.
    pub fn bare(bar: Bar) -> Self {
        let body = bar.body();
        Self {
            bar,
            ema_fast: 0.0,
            ema_slow: 0.0,
            rsi: 0.0,
            kdj_k: 0.0,
            kdj_d: 0.0,
            kdj_j: 0.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_hist: 0.0,
            macd_hollow: 0.0,
            supertrend: 0.0,
            supertrend_trend: false,
            stoch_rsi: 0.0,
            stoch_k: 0.0,
            stoch_d: 0.0,
            obv: 0.0,
            body,
            ema_spread: 0.0,
            macd_spread: 0.0,
            kdj_spread: 0.0,
            ema_fast_delta: 0.0,
            enriched: false,
        }
    }
}

/// Enrich a window, degrading to unenriched bars if a computation fails.
pub fn enrich(bars: &[Bar]) -> Vec<EnrichedBar> {
    let started = Instant::now();
    match try_enrich(bars) {
        Ok(enriched) => {
            debug!(
                bars = enriched.len(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "technical indicators calculated"
            );
            enriched
        }
        Err(err) => {
            error!(
                %err,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "indicator calculation failed, returning window unenriched"
            );
            bars.iter().cloned().map(EnrichedBar::bare).collect()
        }
    }
}

pub fn try_enrich(bars: &[Bar]) -> Result<Vec<EnrichedBar>, AgentError> {
    if bars.is_empty() {
        return Err(AgentError::Indicator {
            reason: "empty window".into(),
        });
    }

    let filled = forward_fill(bars);
    if let Some(index) = filled
        .iter()
        .position(|b| !(b.close.is_finite() && b.high.is_finite() && b.low.is_finite()))
    {
        return Err(AgentError::Indicator {
            reason: format!("bar {index} has no usable price"),
        });
    }

    let closes: Vec<f64> = filled.iter().map(|b| b.close).collect();

    let ema_fast = ema::ema_values(&closes, ema::FAST_PERIOD);
    let ema_slow = ema::ema_values(&closes, ema::SLOW_PERIOD);
    let rsi = rsi::rsi_values(&closes, rsi::DEFAULT_PERIOD);
    let kdj = kdj::calculate_kdj(&filled, kdj::DEFAULT_PERIOD, kdj::DEFAULT_SIGNAL);
    let macd = macd::calculate_macd_default(&closes);
    let trend = supertrend::calculate_supertrend(
        &filled,
        supertrend::DEFAULT_PERIOD,
        supertrend::DEFAULT_MULTIPLIER,
    );
    let stoch = stoch_rsi::calculate_stoch_rsi(
        &rsi,
        stoch_rsi::DEFAULT_LENGTH,
        stoch_rsi::DEFAULT_K,
        stoch_rsi::DEFAULT_D,
    );
    let obv = obv::calculate_obv(&filled);

    let enriched = filled
        .into_iter()
        .enumerate()
        .map(|(i, bar)| {
            let ema_fast_delta = match i.checked_sub(1) {
                Some(prev) => ema_fast[prev] - ema_fast[i],
                None => 0.0,
            };
            EnrichedBar {
                body: bar.body(),
                bar,
                ema_fast: ema_fast[i],
                ema_slow: ema_slow[i],
                rsi: rsi[i],
                kdj_k: kdj.k[i],
                kdj_d: kdj.d[i],
                kdj_j: kdj.j[i],
                macd: macd.line[i],
                macd_signal: macd.signal[i],
                macd_hist: macd.histogram[i],
                macd_hollow: macd.hollow[i],
                supertrend: trend.value[i],
                supertrend_trend: trend.bands[i].trend_up,
                stoch_rsi: stoch.stoch_rsi[i],
                stoch_k: stoch.k[i],
                stoch_d: stoch.d[i],
                obv: obv[i],
                ema_spread: ema_fast[i] - ema_slow[i],
                macd_spread: macd.line[i] - macd.signal[i],
                kdj_spread: kdj.j[i] - kdj.d[i],
                ema_fast_delta,
                enriched: true,
            }
        })
        .collect();

    Ok(enriched)
}

/// Carry the last known value forward over missing (non-finite) fields.
///
/// A missing high or low first falls back to the same bar's close; a missing
/// open falls back to the close; a leading missing volume becomes 0.
pub fn forward_fill(bars: &[Bar]) -> Vec<Bar> {
    let mut filled: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        let prev = filled.last();
        let mut next = bar.clone();

        if !next.close.is_finite() {
            next.close = prev.map_or(f64::NAN, |p| p.close);
        }
        if !next.high.is_finite() {
            next.high = if bar.close.is_finite() {
                bar.close
            } else {
                prev.map_or(f64::NAN, |p| p.high)
            };
        }
        if !next.low.is_finite() {
            next.low = if bar.close.is_finite() {
                bar.close
            } else {
                prev.map_or(f64::NAN, |p| p.low)
            };
        }
        if !next.open.is_finite() {
            next.open = next.close;
        }
        if !next.volume.is_finite() {
            next.volume = prev.map_or(0.0, |p| p.volume);
        }

        filled.push(next);
    }
    filled
}

/// Rolling mean over at most `window` trailing values.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, &value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        out.push(sum / (i + 1).min(window) as f64);
    }
    out
}

/// Rolling minimum over at most `window` trailing values.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::min)
}

/// Rolling maximum over at most `window` trailing values.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling_fold(values, window, f64::max)
}

fn rolling_fold(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            values[start..=i]
                .iter()
                .copied()
                .reduce(pick)
                .unwrap_or(f64::NAN)
        })
        .collect()
}
