//! Router outcomes, errors, and the events published to the console.

use helpdesk_core::{Message, SessionId, TransportError};
use helpdesk_protocol::ProtocolError;
use thiserror::Error;

use crate::registry::RegistryError;

// ============================================================================
// Chat Events
// ============================================================================

/// Events the router publishes for live display.
///
/// Delivered over a broadcast channel; the operator console subscribes and
/// renders them. Publishing with no subscriber is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A customer connected and was registered.
    ClientConnected {
        session_id: SessionId,
        display_name: String,
    },

    /// A customer's connection ended and the session was removed.
    ClientDisconnected {
        session_id: SessionId,
        display_name: String,
    },

    /// The customer the operator is chatting with sent a message.
    TargetMessage {
        session_id: SessionId,
        message: Message,
    },
}

// ============================================================================
// Send Outcome
// ============================================================================

/// Result of sending an operator reply to the active target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Logged and handed to the customer's connection.
    Delivered {
        session_id: SessionId,
        display_name: String,
    },

    /// No chat is active; nothing was logged.
    NoTarget,

    /// The target disconnected; the active target has been cleared.
    TargetGone { session_id: SessionId },

    /// Logged, but the connection refused the write. The session stays
    /// registered until its reader observes the disconnect.
    Undelivered {
        session_id: SessionId,
        display_name: String,
        reason: String,
    },
}

// ============================================================================
// Router Errors
// ============================================================================

/// Errors that can occur during routing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The session is not (or no longer) registered.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] ProtocolError),

    #[error("delivery to {session_id} failed: {source}")]
    Delivery {
        session_id: SessionId,
        #[source]
        source: TransportError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_error_display() {
        let err = RouterError::SessionNotFound(SessionId::new("C4"));
        assert_eq!(err.to_string(), "session not found: C4");

        let err = RouterError::Delivery {
            session_id: SessionId::new("C2"),
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "delivery to C2 failed: connection closed");

        let err: RouterError = RegistryError::SessionAlreadyExists(SessionId::new("C1")).into();
        assert_eq!(err.to_string(), "session already exists: C1");
    }
}
