//! kdjtrader: a single-symbol spot trading agent driven by KDJ, Supertrend
//! and MACD signals.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command line entry in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
