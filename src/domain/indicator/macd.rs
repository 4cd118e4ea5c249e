//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9

use crate::domain::indicator::ema::ema_values;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
    pub hollow: Vec<f64>,
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    if closes.is_empty() || fast == 0 || slow == 0 || signal == 0 {
        return MacdSeries::default();
    }

    let ema_fast = ema_values(closes, fast);
    let ema_slow = ema_values(closes, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_values(&line, signal);
    let histogram: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(l, s)| l - s)
        .collect();
    let hollow = hollow_histogram(&histogram);

    MacdSeries {
        line,
        signal: signal_line,
        histogram,
        hollow,
    }
}

pub fn calculate_macd_default(closes: &[f64]) -> MacdSeries {
    calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

/// Histogram filtered down to bars where momentum is fading toward zero.
///
/// Positive and shrinking versus the prior bar keeps `hist`; negative and
/// rising keeps `-hist`; everything else, including the first bar, is 0.
pub fn hollow_histogram(histogram: &[f64]) -> Vec<f64> {
    let mut hollow = Vec::with_capacity(histogram.len());
    for (i, &hist) in histogram.iter().enumerate() {
        let value = match i.checked_sub(1).map(|p| histogram[p]) {
            Some(prev) if hist > 0.0 && hist < prev => hist,
            Some(prev) if hist < 0.0 && hist > prev => -hist,
            _ => 0.0,
        };
        hollow.push(value);
    }
    hollow
}
