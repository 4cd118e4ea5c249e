//! Concrete adapter implementations for ports.

#[cfg(feature = "live")]
pub mod binance_adapter;
pub mod clock;
pub mod csv_replay_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod memory_signal_store;
pub mod paper_venue;
#[cfg(feature = "sqlite")]
pub mod sqlite_signal_store;
pub mod stdin_commands;
#[cfg(feature = "live")]
pub mod telegram_adapter;
