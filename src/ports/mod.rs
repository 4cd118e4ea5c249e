//! Port traits for the agent's external collaborators.

pub mod clock_port;
pub mod command_port;
pub mod config_port;
pub mod execution_port;
pub mod market_data_port;
pub mod notifier_port;
pub mod signal_store_port;
