//! Configuration validation.
//!
//! Validates all agent config fields before the agent is built.

use chrono::DateTime;

use crate::domain::error::AgentError;
use crate::domain::schedule::Timeframe;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INTERVAL_SECONDS: i64 = 60;

pub fn validate_agent_config(config: &dyn ConfigPort) -> Result<(), AgentError> {
    validate_symbol(config)?;
    validate_timeframe(config)?;
    validate_notional(config)?;
    validate_percentages(config)?;
    validate_window_capacity(config)?;
    validate_stop(config)?;
    validate_retries(config)?;
    Ok(())
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), AgentError> {
    match config.get_string("agent", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(AgentError::ConfigMissing {
            section: "agent".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), AgentError> {
    let label = match config.get_string("agent", "timeframe") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(AgentError::ConfigMissing {
                section: "agent".to_string(),
                key: "timeframe".to_string(),
            });
        }
    };
    if Timeframe::known_seconds(label.trim()).is_some() {
        return Ok(());
    }
    let interval = config.get_int("agent", "interval_seconds", DEFAULT_INTERVAL_SECONDS);
    if interval <= 0 {
        return Err(AgentError::config_invalid(
            "agent",
            "interval_seconds",
            "interval_seconds must be positive",
        ));
    }
    Ok(())
}

fn validate_notional(config: &dyn ConfigPort) -> Result<(), AgentError> {
    let value = config.get_double("agent", "notional", 0.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(AgentError::config_invalid(
            "agent",
            "notional",
            "notional must be positive",
        ));
    }
    Ok(())
}

fn validate_percentages(config: &dyn ConfigPort) -> Result<(), AgentError> {
    let stop_loss = config.get_double("agent", "stop_loss_pct", 2.0);
    if stop_loss <= 0.0 || stop_loss >= 100.0 {
        return Err(AgentError::config_invalid(
            "agent",
            "stop_loss_pct",
            "stop_loss_pct must be between 0 and 100",
        ));
    }
    let take_profit = config.get_double("agent", "take_profit_pct", 5.0);
    if take_profit <= 0.0 || !take_profit.is_finite() {
        return Err(AgentError::config_invalid(
            "agent",
            "take_profit_pct",
            "take_profit_pct must be positive",
        ));
    }
    Ok(())
}

fn validate_window_capacity(config: &dyn ConfigPort) -> Result<(), AgentError> {
    let value = config.get_int("agent", "window_capacity", 100);
    if value < 2 {
        return Err(AgentError::config_invalid(
            "agent",
            "window_capacity",
            "window_capacity must be at least 2",
        ));
    }
    Ok(())
}

fn validate_stop(config: &dyn ConfigPort) -> Result<(), AgentError> {
    if config.get_int("agent", "stop_after_seconds", 0) < 0 {
        return Err(AgentError::config_invalid(
            "agent",
            "stop_after_seconds",
            "stop_after_seconds must be non-negative",
        ));
    }
    if let Some(stop_at) = config.get_string("agent", "stop_at") {
        DateTime::parse_from_rfc3339(stop_at.trim()).map_err(|_| {
            AgentError::config_invalid(
                "agent",
                "stop_at",
                "invalid stop_at format, expected RFC 3339",
            )
        })?;
    }
    Ok(())
}

fn validate_retries(config: &dyn ConfigPort) -> Result<(), AgentError> {
    for prefix in ["fetch", "store", "notify"] {
        let attempts_key = format!("{prefix}_attempts");
        if config.get_int("retry", &attempts_key, 3) < 1 {
            return Err(AgentError::config_invalid(
                "retry",
                &attempts_key,
                format!("{attempts_key} must be at least 1"),
            ));
        }
        let delay_key = format!("{prefix}_delay_seconds");
        if config.get_double("retry", &delay_key, 0.0) < 0.0 {
            return Err(AgentError::config_invalid(
                "retry",
                &delay_key,
                format!("{delay_key} must be non-negative"),
            ));
        }
    }
    Ok(())
}
