//! Primary position state and protective exit levels.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long {
        entry_price: f64,
    },
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long { .. })
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            PositionState::Long { entry_price } => Some(*entry_price),
            PositionState::Flat => None,
        }
    }

    /// Per-unit profit of closing at `price`, or 0 when flat.
    pub fn profit_at(&self, price: f64) -> f64 {
        self.entry_price().map_or(0.0, |entry| price - entry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectiveLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl ProtectiveLevels {
    pub fn from_entry(entry_price: f64, stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        Self {
            stop_loss: entry_price * (1.0 - stop_loss_pct / 100.0),
            take_profit: entry_price * (1.0 + take_profit_pct / 100.0),
        }
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        price <= self.stop_loss
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        price >= self.take_profit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn flat_is_default() {
        let position = PositionState::default();
        assert!(!position.is_long());
        assert_eq!(position.entry_price(), None);
        assert_eq!(position.profit_at(120.0), 0.0);
    }

    #[test]
    fn long_profit_is_per_unit() {
        let position = PositionState::Long { entry_price: 50.0 };
        assert!(position.is_long());
        assert_relative_eq!(position.profit_at(55.0), 5.0);
        assert_relative_eq!(position.profit_at(47.5), -2.5);
    }

    #[test]
    fn levels_from_entry() {
        let levels = ProtectiveLevels::from_entry(100.0, 2.0, 5.0);
        assert_relative_eq!(levels.stop_loss, 98.0);
        assert_relative_eq!(levels.take_profit, 105.0);
    }

    #[test]
    fn stop_loss_is_inclusive() {
        let levels = ProtectiveLevels::from_entry(100.0, 2.0, 5.0);
        assert!(levels.should_stop_loss(98.0));
        assert!(levels.should_stop_loss(90.0));
        assert!(!levels.should_stop_loss(98.5));
    }

    #[test]
    fn take_profit_is_inclusive() {
        let levels = ProtectiveLevels::from_entry(100.0, 2.0, 5.0);
        assert!(levels.should_take_profit(105.0));
        assert!(!levels.should_take_profit(104.99));
    }

    #[test]
    fn nan_price_hits_neither_level() {
        let levels = ProtectiveLevels::from_entry(100.0, 2.0, 5.0);
        assert!(!levels.should_stop_loss(f64::NAN));
        assert!(!levels.should_take_profit(f64::NAN));
    }
}
