//! Slash-command parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Commands the bot answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Start,
    Help,
    Status,
    Convert,
    Clear,
    Count,
}

impl Command {
    /// Parse the first word of a message.
    ///
    /// Accepts `/name` and `/name@botname`, case-insensitively; anything after
    /// the first whitespace is ignored. Returns `None` for plain text and
    /// unknown commands.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "status" => Some(Command::Status),
            "convert" => Some(Command::Convert),
            "clear" => Some(Command::Clear),
            "count" => Some(Command::Count),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Status => "status",
            Command::Convert => "convert",
            Command::Clear => "clear",
            Command::Count => "count",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}
