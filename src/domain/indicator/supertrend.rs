//! Supertrend overlay.
//!
//! ATR is the simple rolling mean of true range over `period` bars (fewer while
//! warming up; the first bar's true range is high - low). Basic bands are
//! (high + low) / 2 ± multiplier * ATR.
//!
//! Final bands depend on the previous bar's final bands, so they are folded
//! strictly left to right:
//! - final_upper[i] = basic_upper[i] if basic_upper[i] < final_upper[i-1]
//!   or close[i-1] > final_upper[i-1], else final_upper[i-1]
//! - final_lower[i] = basic_lower[i] if basic_lower[i] > final_lower[i-1]
//!   or close[i-1] < final_lower[i-1], else final_lower[i-1]
//! - trend_up[i] = close[i] > final_upper[i-1]; trend_up[0] = true
//!
//! The plotted value is final_upper while close <= final_upper, else final_lower.

use crate::domain::indicator::rolling_mean;
use crate::domain::ohlcv::Bar;

pub const DEFAULT_PERIOD: usize = 10;
pub const DEFAULT_MULTIPLIER: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    pub final_upper: f64,
    pub final_lower: f64,
    pub trend_up: bool,
}

impl BandState {
    /// Advance the bands by one bar.
    pub fn carry_forward(
        &self,
        basic_upper: f64,
        basic_lower: f64,
        prev_close: f64,
        close: f64,
    ) -> BandState {
        let final_upper = if basic_upper < self.final_upper || prev_close > self.final_upper {
            basic_upper
        } else {
            self.final_upper
        };
        let final_lower = if basic_lower > self.final_lower || prev_close < self.final_lower {
            basic_lower
        } else {
            self.final_lower
        };
        BandState {
            final_upper,
            final_lower,
            trend_up: close > self.final_upper,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SupertrendSeries {
    pub basic_upper: Vec<f64>,
    pub basic_lower: Vec<f64>,
    pub bands: Vec<BandState>,
    pub value: Vec<f64>,
}

pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| match i.checked_sub(1) {
            Some(prev) => bar.true_range(bars[prev].close),
            None => bar.high - bar.low,
        })
        .collect()
}

pub fn calculate_supertrend(bars: &[Bar], period: usize, multiplier: f64) -> SupertrendSeries {
    if bars.is_empty() {
        return SupertrendSeries::default();
    }

    let atr = rolling_mean(&true_ranges(bars), period.max(1));
    let basic_upper: Vec<f64> = bars
        .iter()
        .zip(&atr)
        .map(|(bar, atr)| bar.midpoint() + multiplier * atr)
        .collect();
    let basic_lower: Vec<f64> = bars
        .iter()
        .zip(&atr)
        .map(|(bar, atr)| bar.midpoint() - multiplier * atr)
        .collect();

    let bands = fold_bands(bars, &basic_upper, &basic_lower);

    let value = bars
        .iter()
        .zip(&bands)
        .map(|(bar, band)| {
            if bar.close <= band.final_upper {
                band.final_upper
            } else {
                band.final_lower
            }
        })
        .collect();

    SupertrendSeries {
        basic_upper,
        basic_lower,
        bands,
        value,
    }
}

fn fold_bands(bars: &[Bar], basic_upper: &[f64], basic_lower: &[f64]) -> Vec<BandState> {
    let mut bands: Vec<BandState> = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        let next = match bands.last() {
            None => BandState {
                final_upper: basic_upper[0],
                final_lower: basic_lower[0],
                trend_up: true,
            },
            Some(prev) => prev.carry_forward(
                basic_upper[i],
                basic_lower[i],
                bars[i - 1].close,
                bars[i].close,
            ),
        };
        bands.push(next);
    }
    bands
}
