//! Concurrent directory of live customer sessions.
//!
//! The registry is the one structure written by many tasks at once (every
//! connection handler registers and removes itself) while the operator
//! console reads it. It sits behind a reader/writer lock: lookups and
//! snapshots share the lock, add/remove take it exclusively.
//!
//! Sessions are handed out as `Arc<Session>` clones, so callers never hold
//! the registry lock while they take a session's own lock.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Duplicate ids are reported as `RegistryError`, never asserted

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use helpdesk_core::{Session, SessionId};

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session with this ID already exists.
    ///
    /// Ids are allocated from a counter, so this indicates a logic error.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),
}

/// Live sessions keyed by id.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a session under its id.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionAlreadyExists` if the id is taken; the
    ///   existing entry is left untouched
    pub async fn add(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(session.id()) {
            warn!(session_id = %session.id(), "Duplicate session id rejected");
            return Err(RegistryError::SessionAlreadyExists(session.id().clone()));
        }

        debug!(session_id = %session.id(), total = sessions.len() + 1, "Session registered");
        sessions.insert(session.id().clone(), session);
        Ok(())
    }

    /// Removes a session, returning it if it was present.
    ///
    /// Removing an absent id is a no-op: a connection handler and a shutdown
    /// sweep may race to remove the same session.
    pub async fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Looks up a session. `None` is an ordinary outcome.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Point-in-time copy of every registered session.
    pub async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
