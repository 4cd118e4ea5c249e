//! Operator commands.

use std::str::FromStr;

pub const HELP_TEXT: &str = "Commands: /help, /stop, /stopN, /start, /status, /performance, /count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Liquidate and halt until `start`.
    Stop,
    /// Liquidate and sit out `multiples` timeframes.
    Pause { multiples: u32 },
    Start,
    Status,
    Performance,
    Count,
}

impl FromStr for Command {
    type Err = String;

    /// Accepts `help`, `stop`, `stopN` (N ≥ 1), `start`, `status`,
    /// `performance` and `count`, with or without a leading `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let name = text.strip_prefix('/').unwrap_or(text);
        match name {
            "help" => Ok(Command::Help),
            "stop" => Ok(Command::Stop),
            "start" => Ok(Command::Start),
            "status" => Ok(Command::Status),
            "performance" => Ok(Command::Performance),
            "count" => Ok(Command::Count),
            _ => match name.strip_prefix("stop").map(str::parse::<u32>) {
                Some(Ok(multiples)) if multiples > 0 => Ok(Command::Pause { multiples }),
                _ => Err(format!("unknown command '{text}'")),
            },
        }
    }
}
