//! Session entities: one per live customer connection.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Connection, DomainError, DomainResult, Message, TransportError};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Prefix for ids handed out by the server ("C1", "C2", ...).
pub const SESSION_ID_PREFIX: &str = "C";

/// Unique identifier for a customer session.
///
/// Allocated from a monotonic counter when the connection is accepted, so an
/// id is never reused for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates the id for the `sequence`-th accepted connection.
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{SESSION_ID_PREFIX}{sequence}"))
    }

    /// Parses an id typed by the operator.
    ///
    /// Ids are a single non-empty word; anything else can never match a
    /// registered session and is rejected up front.
    pub fn parse(input: &str) -> DomainResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidFieldValue {
                field: "session id".to_string(),
                value: input.to_string(),
                expected: "a single word such as C1".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Session
// ============================================================================

/// Mutable part of a session, guarded by the session's own lock.
#[derive(Debug)]
struct Conversation {
    last_activity: DateTime<Utc>,
    log: Vec<Message>,
}

/// In-memory record of one live customer connection.
///
/// Identity, display name and connection handle are fixed at construction.
/// The conversation log and last-activity time sit behind a per-session lock
/// so unrelated sessions never contend with each other or with the registry.
pub struct Session {
    id: SessionId,
    display_name: String,
    connected_at: DateTime<Utc>,
    connection: Arc<dyn Connection>,
    conversation: Mutex<Conversation>,
}

impl Session {
    /// Creates a session with an empty log.
    pub fn new(
        id: SessionId,
        display_name: impl Into<String>,
        connection: Arc<dyn Connection>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            connected_at: now,
            connection,
            conversation: Mutex::new(Conversation {
                last_activity: now,
                log: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Appends a message received from the customer and bumps last activity.
    pub async fn record_inbound(&self, message: Message) {
        let mut conversation = self.conversation.lock().await;
        conversation.last_activity = message.timestamp();
        conversation.log.push(message);
    }

    /// Appends a message without touching last activity (operator replies).
    pub async fn append(&self, message: Message) {
        self.conversation.lock().await.log.push(message);
    }

    /// Returns a copy of the log taken under the session lock.
    pub async fn history(&self) -> Vec<Message> {
        self.conversation.lock().await.log.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.conversation.lock().await.log.len()
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        self.conversation.lock().await.last_activity
    }

    /// Builds a read-only listing entry.
    pub async fn summary(&self, is_active_target: bool) -> SessionSummary {
        let conversation = self.conversation.lock().await;
        SessionSummary {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            last_activity: conversation.last_activity,
            message_count: conversation.log.len(),
            is_active_target,
        }
    }

    /// Writes an already-encoded frame through the connection.
    pub fn deliver(&self, frame: &str) -> Result<(), TransportError> {
        debug!(session_id = %self.id, bytes = frame.len(), "Delivering frame");
        self.connection.send_text(frame)
    }

    /// Closes the underlying connection.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Returns the connection's peer description.
    pub fn peer(&self) -> String {
        self.connection.peer()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("connected_at", &self.connected_at)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session Summary
// ============================================================================

/// Listing entry shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub display_name: String,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub is_active_target: bool,
}
