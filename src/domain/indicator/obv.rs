//! OBV (On-Balance Volume) indicator.

use crate::domain::ohlcv::Bar;

/// Calculate OBV (On-Balance Volume).
///
/// OBV[0] = 0
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// A non-finite volume contributes nothing.
pub fn calculate_obv(bars: &[Bar]) -> Vec<f64> {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let change = bar.close - bars[i - 1].close;
            let volume = if bar.volume.is_finite() { bar.volume } else { 0.0 };
            if change > 0.0 {
                obv += volume;
            } else if change < 0.0 {
                obv -= volume;
            }
        }
        values.push(obv);
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bars(closes_volumes: &[(f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes_volumes
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| Bar {
                timestamp: start + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume,
            })
            .collect()
    }

    #[test]
    fn obv_first_bar_is_zero() {
        let series = calculate_obv(&make_bars(&[(100.0, 1000.0)]));
        assert_eq!(series, vec![0.0]);
    }

    #[test]
    fn obv_adds_volume_on_up_bar() {
        let series = calculate_obv(&make_bars(&[(100.0, 1000.0), (105.0, 500.0)]));
        assert!((series[1] - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn obv_subtracts_volume_on_down_bar() {
        let series = calculate_obv(&make_bars(&[(100.0, 1000.0), (95.0, 300.0)]));
        assert!((series[1] + 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn obv_unchanged_on_flat_bar() {
        let series = calculate_obv(&make_bars(&[
            (100.0, 1000.0),
            (105.0, 500.0),
            (105.0, 800.0),
        ]));
        assert!((series[2] - series[1]).abs() < f64::EPSILON);
    }

    #[test]
    fn obv_ignores_missing_volume() {
        let series = calculate_obv(&make_bars(&[(100.0, 10.0), (101.0, f64::NAN)]));
        assert_eq!(series, vec![0.0, 0.0]);
    }

    #[test]
    fn obv_empty() {
        assert!(calculate_obv(&[]).is_empty());
    }
}
