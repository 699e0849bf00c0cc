//! Chat messages exchanged between customers and the operator.

use crate::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Message Kind
// ============================================================================

/// Who produced a message.
///
/// The operator kind is spelled `service` on the wire, matching what
/// customer clients already understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Generated by the server itself (welcome notices).
    System,

    /// Typed by a connected customer.
    Client,

    /// Typed by the operator at the console.
    #[serde(rename = "service")]
    Operator,
}

impl MessageKind {
    /// Returns the wire spelling of this kind.
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Client => "client",
            Self::Operator => "service",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        match s {
            "system" => Ok(Self::System),
            "client" => Ok(Self::Client),
            "service" | "operator" => Ok(Self::Operator),
            other => Err(DomainError::ParseError {
                field: "message type".to_string(),
                reason: format!("unknown message type '{other}'"),
            }),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// One chat line.
///
/// Immutable once constructed: fields are only reachable through accessors.
/// Serializes to the wire shape `{from, content, timestamp, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    from: String,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: MessageKind,
}

impl Message {
    /// Creates a message stamped with the current time.
    pub fn new(kind: MessageKind, from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::at(kind, from, content, Utc::now())
    }

    /// Creates a message with an explicit timestamp.
    pub fn at(
        kind: MessageKind,
        from: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            from: from.into(),
            content: content.into(),
            timestamp,
            kind,
        }
    }

    /// Creates a system notice.
    pub fn system(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, from, content)
    }

    /// Creates a customer message.
    pub fn client(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageKind::Client, from, content)
    }

    /// Creates an operator reply.
    pub fn operator(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(MessageKind::Operator, from, content)
    }

    /// Display name of the sender (the wire `from` field).
    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }
}
