//! Stochastic RSI.
//!
//! stoch_rsi = (rsi - min(rsi, n)) / (max(rsi, n) - min(rsi, n) + 1e-12), in [0, 1]
//! %K = 100 * mean(stoch_rsi, k_len); %D = mean(%K, d_len).
//! Rolling windows shrink to the available bars while warming up.

use crate::domain::indicator::{rolling_max, rolling_mean, rolling_min};

pub const DEFAULT_LENGTH: usize = 14;
pub const DEFAULT_K: usize = 3;
pub const DEFAULT_D: usize = 3;

const RANGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Default)]
pub struct StochRsiSeries {
    pub stoch_rsi: Vec<f64>,
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_stoch_rsi(rsi: &[f64], length: usize, k_len: usize, d_len: usize) -> StochRsiSeries {
    let lows = rolling_min(rsi, length);
    let highs = rolling_max(rsi, length);

    let stoch_rsi: Vec<f64> = rsi
        .iter()
        .zip(lows.iter().zip(&highs))
        .map(|(value, (low, high))| (value - low) / (high - low + RANGE_EPSILON))
        .collect();

    let k: Vec<f64> = rolling_mean(&stoch_rsi, k_len)
        .into_iter()
        .map(|v| v * 100.0)
        .collect();
    let d = rolling_mean(&k, d_len);

    StochRsiSeries { stoch_rsi, k, d }
}
