//! Inbound command port trait.

use crate::domain::error::AgentError;

pub trait CommandPort {
    /// Raw command texts received since the last poll.
    fn poll(&self) -> Result<Vec<String>, AgentError>;
    fn reply(&self, text: &str) -> Result<(), AgentError>;
}
