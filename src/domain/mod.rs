//! Core domain types and logic.

pub mod agent;
pub mod agent_state;
pub mod command;
pub mod config_validation;
pub mod decision;
pub mod dispatch;
pub mod dual_strategy;
pub mod error;
pub mod indicator;
pub mod market_feed;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod retry;
pub mod schedule;
pub mod signal;
pub mod sizing;
pub mod window;
