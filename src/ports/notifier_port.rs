//! Outbound notification port trait.

use crate::domain::error::AgentError;

pub trait NotifierPort: Send {
    fn send(&self, text: &str) -> Result<(), AgentError>;
}
