//! Exponential Moving Average.
//!
//! k = 2/(n+1). The first n values are the running mean of the inputs seen so
//! far, so index n-1 holds the SMA seed; after that EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Short inputs therefore still produce a value for every index.

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;

pub fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    let mut ema = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i < period {
            sum += value;
            ema = sum / (i + 1) as f64;
        } else {
            ema = value * k + ema * (1.0 - k);
        }
        out.push(ema);
    }

    out
}
