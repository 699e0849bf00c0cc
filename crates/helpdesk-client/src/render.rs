//! How server messages appear in the customer's terminal.

use std::io::{self, Write};

use chrono::Local;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use helpdesk_core::{Message, MessageKind};

/// Input prompt.
pub const PROMPT: &str = "you> ";

/// Line for an incoming message, or `None` for kinds customers never see.
pub fn format_incoming(message: &Message) -> Option<String> {
    let time = message
        .timestamp()
        .with_timezone(&Local)
        .format("%H:%M:%S");

    match message.kind() {
        MessageKind::System => Some(format!("🔔 [{time}] {}", message.content())),
        MessageKind::Operator => Some(format!(
            "🎧 [{time}] {}: {}",
            message.sender(),
            message.content()
        )),
        MessageKind::Client => None,
    }
}

/// Replaces whatever is on the current line (usually a half-typed prompt)
/// with `line`, then re-prints the prompt.
pub fn print_over_prompt<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    writeln!(out, "{line}")?;
    write!(out, "{PROMPT}")?;
    out.flush()
}

pub fn print_prompt<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "{PROMPT}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message() {
        let line = format_incoming(&Message::system("System", "Welcome! Your customer number is C1."))
            .unwrap();
        assert!(line.starts_with("🔔 ["));
        assert!(line.ends_with("] Welcome! Your customer number is C1."));
    }

    #[test]
    fn test_operator_message_shows_sender() {
        let line = format_incoming(&Message::operator("Service", "How can I help?")).unwrap();
        assert!(line.starts_with("🎧 ["));
        assert!(line.ends_with("] Service: How can I help?"));
    }

    #[test]
    fn test_client_echo_is_hidden() {
        assert!(format_incoming(&Message::client("Customer-C1", "hi")).is_none());
    }

    #[test]
    fn test_print_over_prompt_ends_with_prompt() {
        let mut out = Vec::new();
        print_over_prompt(&mut out, "hello").unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hello\n"));
        assert!(text.ends_with(PROMPT));
    }
}
