//! Order quantity sizing.

use crate::domain::error::AgentError;

/// Relative slack absorbing binary representation error before truncation.
const SCALE_TOLERANCE: f64 = 1e-12;

/// Truncate `quantity` to `precision` decimal places. Values already on the
/// precision grid, such as `0.29` at two places, are kept as they are.
pub fn round_down(quantity: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision.min(16) as i32);
    let scaled = quantity * scale;
    (scaled + scaled.abs() * SCALE_TOLERANCE).floor() / scale
}

/// Quantity bought for `notional` quote units at `price`.
pub fn buy_quantity(notional: f64, price: f64, precision: u32) -> Result<f64, AgentError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AgentError::Sizing {
            reason: format!("cannot size against price {price}"),
        });
    }
    let quantity = round_down(notional / price, precision);
    if quantity <= 0.0 || !quantity.is_finite() {
        return Err(AgentError::Sizing {
            reason: format!("notional {notional} buys nothing at {price}"),
        });
    }
    Ok(quantity)
}

/// Quantity sold out of a free balance. Zero means nothing to sell.
pub fn sell_quantity(free_balance: f64, precision: u32) -> f64 {
    if !free_balance.is_finite() || free_balance <= 0.0 {
        return 0.0;
    }
    round_down(free_balance, precision)
}

/// `BTC` of `BTC/USDT`.
pub fn base_asset(symbol: &str) -> &str {
    symbol.split('/').next().unwrap_or(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rounds_down_to_precision() {
        assert_relative_eq!(round_down(0.123_456, 3), 0.123);
        assert_relative_eq!(round_down(9.99, 0), 9.0);
    }

    #[test]
    fn values_on_the_grid_survive_rounding() {
        assert_eq!(round_down(0.57, 2), 0.57);
        assert_eq!(round_down(1.15, 2), 1.15);
        assert_eq!(round_down(0.000_35, 5), 0.000_35);
        assert_eq!(sell_quantity(0.29, 2), 0.29);
        assert_eq!(round_down(0.289_999, 2), 0.28);
    }

    #[test]
    fn buy_quantity_from_notional() {
        assert_relative_eq!(buy_quantity(15.0, 42_000.0, 5).unwrap(), 0.00035);
        assert_relative_eq!(buy_quantity(100.0, 20.0, 2).unwrap(), 5.0);
    }

    #[test]
    fn buy_quantity_rejects_dust_and_bad_prices() {
        assert!(matches!(
            buy_quantity(1.0, 42_000.0, 2),
            Err(AgentError::Sizing { .. })
        ));
        assert!(buy_quantity(15.0, 0.0, 5).is_err());
        assert!(buy_quantity(15.0, f64::NAN, 5).is_err());
    }

    #[test]
    fn sell_quantity_from_balance() {
        assert_relative_eq!(sell_quantity(0.123_456, 4), 0.1234);
        assert_eq!(sell_quantity(0.0, 4), 0.0);
        assert_eq!(sell_quantity(f64::NAN, 4), 0.0);
    }

    #[test]
    fn base_asset_of_pair() {
        assert_eq!(base_asset("BTC/USDT"), "BTC");
        assert_eq!(base_asset("ETHUSDT"), "ETHUSDT");
    }
}
