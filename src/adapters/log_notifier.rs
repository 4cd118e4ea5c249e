//! Notifier that writes messages to the log only.

use tracing::info;

use crate::domain::error::AgentError;
use crate::ports::notifier_port::NotifierPort;

pub struct LogNotifier;

impl NotifierPort for LogNotifier {
    fn send(&self, text: &str) -> Result<(), AgentError> {
        info!(target: "kdjtrader::notify", "{text}");
        Ok(())
    }
}
