//! Operator commands read line by line from a reader, stdin by default.

use std::io::{self, BufRead, BufReader};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, warn};

use crate::domain::error::AgentError;
use crate::ports::command_port::CommandPort;

pub struct StdinCommands {
    receiver: Receiver<String>,
}

impl StdinCommands {
    pub fn spawn() -> Result<Self, AgentError> {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    /// Read commands from `reader` on a background thread.
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Result<Self, AgentError> {
        let (sender, receiver) = mpsc::channel();
        thread::Builder::new()
            .name("command-intake".into())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) if line.trim().is_empty() => continue,
                        Ok(line) => {
                            if sender.send(line).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!(%err, "command input failed, intake closed");
                            break;
                        }
                    }
                }
                debug!("command input ended");
            })?;
        Ok(Self { receiver })
    }
}

impl CommandPort for StdinCommands {
    fn poll(&self) -> Result<Vec<String>, AgentError> {
        let mut commands = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(commands)
    }

    fn reply(&self, text: &str) -> Result<(), AgentError> {
        println!("{text}");
        Ok(())
    }
}

/// Command intake with nothing to say, for unattended replays.
pub struct NoCommands;

impl CommandPort for NoCommands {
    fn poll(&self) -> Result<Vec<String>, AgentError> {
        Ok(Vec::new())
    }

    fn reply(&self, _text: &str) -> Result<(), AgentError> {
        Ok(())
    }
}
