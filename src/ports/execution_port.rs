//! Order execution venue port trait.

use crate::domain::error::AgentError;

pub trait ExecutionPort {
    /// Number of decimal places the venue accepts for order quantities.
    fn quantity_precision(&self, symbol: &str) -> Result<u32, AgentError>;
    fn market_buy(&self, symbol: &str, quantity: f64) -> Result<String, AgentError>;
    fn market_sell(&self, symbol: &str, quantity: f64) -> Result<String, AgentError>;
    fn free_balance(&self, asset: &str) -> Result<f64, AgentError>;
}
