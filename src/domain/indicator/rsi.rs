//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First `n` changes: running mean of gains/losses (index n holds the SMA seed)
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100, or 50 when there were no gains either.
//! The first bar has no change yet and reports the neutral 50.

pub const DEFAULT_PERIOD: usize = 14;
pub const NEUTRAL_RSI: f64 = 50.0;

pub fn rsi_values(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() {
        return Vec::new();
    }
    if period == 0 {
        return vec![NEUTRAL_RSI; closes.len()];
    }

    let mut values = Vec::with_capacity(closes.len());
    values.push(NEUTRAL_RSI);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        let seen = i.min(period) as f64;
        avg_gain = (avg_gain * (seen - 1.0) + gain) / seen;
        avg_loss = (avg_loss * (seen - 1.0) + loss) / seen;

        values.push(rsi_from_averages(avg_gain, avg_loss));
    }

    values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss <= 0.0 {
        if avg_gain > 0.0 { 100.0 } else { NEUTRAL_RSI }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
