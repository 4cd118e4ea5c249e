//! Domain error types.

/// Top-level error type for kdjtrader.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol} on {timeframe}")]
    NoData { symbol: String, timeframe: String },

    #[error("market data error: {reason}")]
    MarketData { reason: String },

    #[error("execution error: {reason}")]
    Execution { reason: String },

    #[error("order sizing error: {reason}")]
    Sizing { reason: String },

    #[error("notification error: {reason}")]
    Notification { reason: String },

    #[error("command intake error: {reason}")]
    CommandIntake { reason: String },

    #[error("indicator error: {reason}")]
    Indicator { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AgentError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&AgentError> for std::process::ExitCode {
    fn from(err: &AgentError) -> Self {
        let code: u8 = match err {
            AgentError::Io(_) | AgentError::Csv(_) => 1,
            AgentError::ConfigParse { .. }
            | AgentError::ConfigMissing { .. }
            | AgentError::ConfigInvalid { .. } => 2,
            AgentError::Database { .. } | AgentError::DatabaseQuery { .. } => 3,
            AgentError::MarketData { .. }
            | AgentError::Execution { .. }
            | AgentError::Sizing { .. }
            | AgentError::Notification { .. }
            | AgentError::CommandIntake { .. }
            | AgentError::Indicator { .. } => 4,
            AgentError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
