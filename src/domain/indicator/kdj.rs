//! KDJ stochastic oscillator.
//!
//! RSV = 100 * (close - lowest_low) / (highest_high - lowest_low) over the last
//! `period` bars (fewer while warming up). K and D are smoothed with
//! K = ((s-1)*K_prev + RSV) / s and D = ((s-1)*D_prev + K) / s, both seeded at 50.
//! J = 3K - 2D and is not clamped, so it can leave [0, 100].

use crate::domain::ohlcv::Bar;

pub const DEFAULT_PERIOD: usize = 9;
pub const DEFAULT_SIGNAL: usize = 3;

const SEED: f64 = 50.0;
const RANGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Default)]
pub struct KdjSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

pub fn calculate_kdj(bars: &[Bar], period: usize, signal: usize) -> KdjSeries {
    let period = period.max(1);
    let smoothing = signal.max(1) as f64;

    let mut series = KdjSeries {
        k: Vec::with_capacity(bars.len()),
        d: Vec::with_capacity(bars.len()),
        j: Vec::with_capacity(bars.len()),
    };

    let mut k = SEED;
    let mut d = SEED;

    for (i, bar) in bars.iter().enumerate() {
        let start = (i + 1).saturating_sub(period);
        let window = &bars[start..=i];
        let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;

        let rsv = if range > RANGE_EPSILON {
            100.0 * (bar.close - lowest) / range
        } else {
            SEED
        };

        k = ((smoothing - 1.0) * k + rsv) / smoothing;
        d = ((smoothing - 1.0) * d + k) / smoothing;

        series.k.push(k);
        series.d.push(d);
        series.j.push(3.0 * k - 2.0 * d);
    }

    series
}
