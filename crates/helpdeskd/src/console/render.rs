//! Text rendering for the operator console.
//!
//! Every function returns the text to print; nothing here writes to a
//! terminal, so the console can be driven against any `Write`.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};

use helpdesk_core::{Message, SessionId, SessionSummary};

use crate::router::{ChatEvent, SendOutcome};

/// Prompt shown while a chat is active.
pub const REPLY_PROMPT: &str = "reply> ";

const RULE: &str = "-----------------------------------------------------------";

/// Wall-clock time in the operator's zone, `HH:MM:SS`.
pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn banner(customer_url: &str) -> String {
    format!(
        "🎧 Helpdesk console ready\n\
         Customers connect to: {customer_url}\n\
         \n\
         {}\n\
         Waiting for customers...\n",
        help()
    )
}

pub fn help() -> String {
    "Commands:\n\
     \x20 list           show online customers\n\
     \x20 chat <id>      chat with a customer\n\
     \x20 history <id>   show a customer's conversation\n\
     \x20 end            leave the current chat\n\
     \x20 help           show this overview\n\
     \x20 quit           shut down\n"
        .to_string()
}

/// Table of online customers, oldest connection first.
pub fn format_listing(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "📭 no customers online\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "\n📋 Online customers:");
    let _ = writeln!(out, "{:<8}{:<20}{:<14}{}", "ID", "Name", "Last active", "Messages");
    let _ = writeln!(out, "{RULE}");
    for s in sessions {
        let marker = if s.is_active_target { "  [chatting]" } else { "" };
        let _ = writeln!(
            out,
            "{:<8}{:<20}{:<14}{}{}",
            s.id.as_str(),
            s.display_name,
            format_time(s.last_activity),
            s.message_count,
            marker
        );
    }
    out.push('\n');
    out
}

pub fn format_history(session_id: &SessionId, display_name: &str, messages: &[Message]) -> String {
    if messages.is_empty() {
        return format!("📭 no messages yet for {session_id}\n");
    }

    let mut out = String::new();
    let _ = writeln!(out, "\n📜 Conversation with {display_name} ({session_id}):");
    let _ = writeln!(out, "{RULE}");
    for message in messages {
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            format_time(message.timestamp()),
            message.sender(),
            message.content()
        );
    }
    let _ = writeln!(out, "{RULE}");
    out
}

pub fn format_chat_started(session_id: &SessionId, display_name: &str) -> String {
    format!(
        "💬 Chatting with {display_name} ({session_id})\n\
         Type to reply, 'end' to leave the chat, 'list' to see customers\n"
    )
}

pub fn format_chat_ended(previous: Option<&SessionId>) -> String {
    match previous {
        Some(id) => format!("Chat with {id} ended\n"),
        None => "No active chat\n".to_string(),
    }
}

pub fn format_not_found(session_id: &SessionId) -> String {
    format!("❌ Customer {session_id} not found\n")
}

pub fn format_unknown_command() -> String {
    "Unknown command. Type 'list' to see customers, 'chat <id>' to start a chat\n".to_string()
}

/// Result of a reply, as told to the operator.
pub fn format_outcome(outcome: &SendOutcome, content: &str) -> String {
    match outcome {
        SendOutcome::Delivered { display_name, .. } => {
            format!("✅ Sent to {display_name}: {content}\n")
        }
        SendOutcome::NoTarget => format_unknown_command(),
        SendOutcome::TargetGone { session_id } => {
            format!("❌ Customer {session_id} has gone offline\n")
        }
        SendOutcome::Undelivered {
            display_name,
            reason,
            ..
        } => format!("⚠️  Logged but not delivered to {display_name}: {reason}\n"),
    }
}

/// Live notification for the console.
pub fn format_event(event: &ChatEvent) -> String {
    match event {
        ChatEvent::ClientConnected {
            session_id,
            display_name,
        } => format!("🟢 Customer connected: {display_name} ({session_id})\n"),
        ChatEvent::ClientDisconnected {
            session_id,
            display_name,
        } => format!("🔴 Customer left: {display_name} ({session_id})\n"),
        ChatEvent::TargetMessage {
            session_id,
            message,
        } => format!(
            "\n📨 [{session_id}] {}: {}\n",
            message.sender(),
            message.content()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, count: usize, active: bool) -> SessionSummary {
        SessionSummary {
            id: SessionId::new(id),
            display_name: format!("Customer-{id}"),
            last_activity: Utc::now(),
            message_count: count,
            is_active_target: active,
        }
    }

    #[test]
    fn test_empty_listing() {
        assert!(format_listing(&[]).contains("no customers online"));
    }

    #[test]
    fn test_listing_marks_target() {
        let out = format_listing(&[summary("C1", 0, false), summary("C2", 3, true)]);
        let lines: Vec<&str> = out.lines().collect();

        assert!(out.contains("Last active"));
        let c1 = lines.iter().find(|l| l.starts_with("C1")).unwrap();
        let c2 = lines.iter().find(|l| l.starts_with("C2")).unwrap();
        assert!(!c1.contains("[chatting]"));
        assert!(c2.contains("Customer-C2"));
        assert!(c2.contains("[chatting]"));
    }

    #[test]
    fn test_time_format_is_hh_mm_ss() {
        let text = format_time(Utc::now());
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }

    #[test]
    fn test_history_lines() {
        let messages = vec![
            Message::client("Customer-C1", "hello"),
            Message::operator("Service", "hi there"),
        ];
        let out = format_history(&SessionId::new("C1"), "Customer-C1", &messages);

        assert!(out.contains("] Customer-C1: hello"));
        assert!(out.contains("] Service: hi there"));
        assert!(format_history(&SessionId::new("C1"), "Customer-C1", &[]).contains("no messages yet"));
    }

    #[test]
    fn test_event_rendering() {
        let id = SessionId::new("C4");
        let connected = format_event(&ChatEvent::ClientConnected {
            session_id: id.clone(),
            display_name: "Customer-C4".to_string(),
        });
        assert!(connected.starts_with("🟢"));

        let left = format_event(&ChatEvent::ClientDisconnected {
            session_id: id.clone(),
            display_name: "Customer-C4".to_string(),
        });
        assert!(left.starts_with("🔴"));

        let message = format_event(&ChatEvent::TargetMessage {
            session_id: id,
            message: Message::client("Customer-C4", "where is my order?"),
        });
        assert!(message.contains("📨 [C4] Customer-C4: where is my order?"));
    }

    #[test]
    fn test_outcomes() {
        let delivered = SendOutcome::Delivered {
            session_id: SessionId::new("C1"),
            display_name: "Customer-C1".to_string(),
        };
        assert_eq!(format_outcome(&delivered, "ok"), "✅ Sent to Customer-C1: ok\n");
        assert!(format_outcome(&SendOutcome::NoTarget, "x").contains("Unknown command"));
        assert!(format_outcome(
            &SendOutcome::TargetGone {
                session_id: SessionId::new("C9")
            },
            "x"
        )
        .contains("C9 has gone offline"));
    }

    #[test]
    fn test_banner_lists_commands() {
        let text = banner("ws://127.0.0.1:8899/customer");
        for word in ["list", "chat <id>", "history <id>", "end", "quit"] {
            assert!(text.contains(word), "missing {word}");
        }
        assert!(text.contains("ws://127.0.0.1:8899/customer"));
    }
}
