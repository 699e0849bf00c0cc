//! Chat routing between customer connections and the operator.
//!
//! The router is the synchronization point of the server: every connection
//! handler calls into it for inbound traffic, and the single operator
//! console calls into it for replies and queries. It owns:
//!
//! - the session [`Registry`]
//! - the active-target selector (which customer the operator is talking to)
//! - the session id counter
//! - the broadcast channel of [`ChatEvent`]s
//!
//! There are no process-wide globals: build one `Router`, wrap it in an
//! `Arc`, and hand clones to every task that needs it.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Unknown or vanished sessions surface as `RouterError::SessionNotFound`
//!   or `SendOutcome::TargetGone`, never as a crash

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use helpdesk_core::{Connection, Message, Session, SessionId, SessionSummary};
use helpdesk_protocol::encode_message;

use crate::config::ServerConfig;
use crate::registry::Registry;

mod events;

pub use events::{ChatEvent, RouterError, SendOutcome};

/// Names and sizes the router needs from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    pub operator_name: String,
    pub system_name: String,
    pub customer_prefix: String,
    pub event_buffer: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RouterSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            operator_name: config.operator_name.clone(),
            system_name: config.system_name.clone(),
            customer_prefix: config.customer_prefix.clone(),
            event_buffer: config.event_buffer.max(1),
        }
    }
}

/// Routes messages between customers and the operator.
pub struct Router {
    /// Live sessions
    registry: Registry,

    /// Customer the operator is currently talking to
    active_target: RwLock<Option<SessionId>>,

    /// Source of session ids; never reset while the process runs
    session_counter: AtomicU64,

    /// Live notifications for the console
    events: broadcast::Sender<ChatEvent>,

    settings: RouterSettings,
}

impl Router {
    /// Creates a router with an empty registry and no active target.
    pub fn new(settings: RouterSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));
        Self {
            registry: Registry::new(),
            active_target: RwLock::new(None),
            session_counter: AtomicU64::new(0),
            events,
            settings,
        }
    }

    /// Creates a router with default settings.
    pub fn with_defaults() -> Self {
        Self::new(RouterSettings::default())
    }

    /// Subscribes to live chat events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    // ========================================================================
    // Customer-facing path
    // ========================================================================

    /// Registers a new connection and greets it.
    ///
    /// A welcome that cannot be written is logged; the session stays
    /// registered until its reader notices the broken connection.
    ///
    /// # Errors
    ///
    /// - `RouterError::Registry` if the allocated id is already taken
    pub async fn on_client_connected(
        &self,
        connection: Arc<dyn Connection>,
    ) -> Result<Arc<Session>, RouterError> {
        let sequence = self.session_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = SessionId::from_sequence(sequence);
        let display_name = format!("{}-{}", self.settings.customer_prefix, session_id);

        let session = Arc::new(Session::new(
            session_id.clone(),
            display_name.clone(),
            connection,
        ));
        self.registry.add(Arc::clone(&session)).await?;

        info!(
            session_id = %session_id,
            name = %display_name,
            peer = %session.peer(),
            "Customer connected"
        );

        let welcome = Message::system(
            self.settings.system_name.as_str(),
            format!(
                "Welcome! Your customer number is {session_id}. An operator will be with you shortly."
            ),
        );
        if let Err(e) = self.deliver(&session, &welcome) {
            warn!(session_id = %session_id, error = %e, "Failed to send welcome");
        }

        self.publish(ChatEvent::ClientConnected {
            session_id,
            display_name,
        });

        Ok(session)
    }

    /// Logs a message from a customer and surfaces it if they are the target.
    ///
    /// # Errors
    ///
    /// - `RouterError::SessionNotFound` if the session was already removed
    pub async fn on_client_message(
        &self,
        session_id: &SessionId,
        content: impl Into<String>,
    ) -> Result<(), RouterError> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RouterError::SessionNotFound(session_id.clone()))?;

        let message = Message::client(session.display_name(), content);
        session.record_inbound(message.clone()).await;

        info!(
            session_id = %session_id,
            name = %session.display_name(),
            content = %message.content(),
            "Customer message"
        );

        if self.is_active_target(session_id).await {
            self.publish(ChatEvent::TargetMessage {
                session_id: session_id.clone(),
                message,
            });
        }

        Ok(())
    }

    /// Deregisters a session whose connection ended.
    ///
    /// The active target is left alone; a later send notices the absence.
    pub async fn on_client_disconnected(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.registry.remove(session_id).await;

        match &removed {
            Some(session) => {
                info!(
                    session_id = %session_id,
                    name = %session.display_name(),
                    "Customer disconnected"
                );
                self.publish(ChatEvent::ClientDisconnected {
                    session_id: session_id.clone(),
                    display_name: session.display_name().to_string(),
                });
            }
            None => debug!(session_id = %session_id, "Disconnect for unknown session"),
        }

        removed
    }

    // ========================================================================
    // Operator-facing verbs
    // ========================================================================

    /// Lists every live session, oldest connection first.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let target = self.active_target().await;
        let mut sessions = self.registry.snapshot().await;
        sessions.sort_by(|a, b| {
            a.connected_at()
                .cmp(&b.connected_at())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });

        let mut summaries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let is_target = target.as_ref() == Some(session.id());
            summaries.push(session.summary(is_target).await);
        }
        summaries
    }

    /// Makes `session_id` the active target.
    ///
    /// Overwrites any previous target without confirmation.
    ///
    /// # Errors
    ///
    /// - `RouterError::SessionNotFound` if no such session is registered
    pub async fn set_target(&self, session_id: &SessionId) -> Result<Arc<Session>, RouterError> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RouterError::SessionNotFound(session_id.clone()))?;

        let previous = self.active_target.write().await.replace(session_id.clone());
        info!(
            session_id = %session_id,
            previous = ?previous,
            "Active chat target set"
        );

        Ok(session)
    }

    /// Sends an operator reply to the active target.
    pub async fn send_to_target(&self, content: &str) -> SendOutcome {
        let Some(target) = self.active_target().await else {
            return SendOutcome::NoTarget;
        };

        let Some(session) = self.registry.get(&target).await else {
            self.clear_target_if(&target).await;
            info!(session_id = %target, "Active target has gone away");
            return SendOutcome::TargetGone { session_id: target };
        };

        let message = Message::operator(self.settings.operator_name.as_str(), content);
        session.append(message.clone()).await;

        match self.deliver(&session, &message) {
            Ok(()) => SendOutcome::Delivered {
                session_id: target,
                display_name: session.display_name().to_string(),
            },
            Err(e) => {
                warn!(session_id = %target, error = %e, "Reply not delivered");
                SendOutcome::Undelivered {
                    session_id: target,
                    display_name: session.display_name().to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Clears the active target, returning the previous one. Idempotent.
    pub async fn end_target(&self) -> Option<SessionId> {
        let previous = self.active_target.write().await.take();
        if let Some(id) = &previous {
            info!(session_id = %id, "Active chat ended");
        }
        previous
    }

    /// Returns a copy of a session's conversation.
    ///
    /// # Errors
    ///
    /// - `RouterError::SessionNotFound` if no such session is registered
    pub async fn history(&self, session_id: &SessionId) -> Result<Vec<Message>, RouterError> {
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| RouterError::SessionNotFound(session_id.clone()))?;
        Ok(session.history().await)
    }

    /// Returns the current active target, which may already be stale.
    pub async fn active_target(&self) -> Option<SessionId> {
        self.active_target.read().await.clone()
    }

    /// Closes every registered connection. Handlers deregister themselves
    /// once their readers observe the close.
    pub async fn close_all(&self) -> usize {
        let sessions = self.registry.snapshot().await;
        for session in &sessions {
            session.close();
        }
        info!(count = sessions.len(), "Closed all customer connections");
        sessions.len()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn is_active_target(&self, session_id: &SessionId) -> bool {
        self.active_target.read().await.as_ref() == Some(session_id)
    }

    /// Clears the target only if it still points at `session_id`.
    async fn clear_target_if(&self, session_id: &SessionId) {
        let mut target = self.active_target.write().await;
        if target.as_ref() == Some(session_id) {
            *target = None;
        }
    }

    fn deliver(&self, session: &Session, message: &Message) -> Result<(), RouterError> {
        let frame = encode_message(message)?;
        session
            .deliver(&frame)
            .map_err(|source| RouterError::Delivery {
                session_id: session.id().clone(),
                source,
            })
    }

    fn publish(&self, event: ChatEvent) {
        // No subscribers is fine (tests, headless runs)
        let _ = self.events.send(event);
    }
}
