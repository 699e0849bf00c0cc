//! Operator command parsing.
//!
//! Parsing is pure: a line of text becomes a [`Command`] without looking at
//! router state. Whether bare text is a reply or an unknown command is
//! decided when it is executed.

use thiserror::Error;

use helpdesk_core::{DomainError, SessionId};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show every online customer
    List,

    /// Make a customer the active chat target
    Chat(SessionId),

    /// Print a customer's conversation
    History(SessionId),

    /// Leave the current chat
    End,

    /// Re-print the command overview
    Help,

    /// Shut the server down
    Quit,

    /// Free text for the active chat target
    Reply(String),
}

/// Errors for input that names a command but cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("{0}")]
    InvalidId(#[from] DomainError),
}

/// Parses one console line.
///
/// Returns `Ok(None)` for blank input. The command word is everything up to
/// the first space; `end` and `help` only count when typed on their own, so
/// a reply such as "end of day" is still sent as text.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let input = line.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let (word, argument) = match input.split_once(' ') {
        Some((word, rest)) => (word, Some(rest.trim())),
        None => (input, None),
    };

    let command = match (word, argument) {
        ("quit", _) => Command::Quit,
        ("list", _) => Command::List,
        ("chat", argument) => Command::Chat(required_id(argument, "chat <id>")?),
        ("history", argument) => Command::History(required_id(argument, "history <id>")?),
        ("end", None) => Command::End,
        ("help", None) => Command::Help,
        _ => Command::Reply(input.to_string()),
    };

    Ok(Some(command))
}

fn required_id(argument: Option<&str>, usage: &'static str) -> Result<SessionId, CommandError> {
    match argument {
        Some(arg) if !arg.is_empty() => Ok(SessionId::parse(arg)?),
        _ => Err(CommandError::MissingArgument { usage }),
    }
}
