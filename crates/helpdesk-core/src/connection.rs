//! The write side of a customer connection, as seen by the core.
//!
//! The core never reads from a connection: each transport adapter owns its
//! read half and feeds frames into the router. A [`Session`](crate::Session)
//! only keeps a handle it can write replies through and close.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Errors reported by a transport when writing to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection has already been closed.
    #[error("connection closed")]
    Closed,

    /// The transport failed while writing.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Write handle for one customer connection.
///
/// Implementations must not block: a write is handed off to whatever task
/// owns the socket and failures surface as `TransportError`.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Queues one text frame for delivery.
    fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Asks the transport to close the connection. Idempotent.
    fn close(&self);

    /// Human-readable peer description for logs.
    fn peer(&self) -> String {
        "unknown".to_string()
    }
}

// ============================================================================
// In-Memory Connection
// ============================================================================

/// A connection that records every frame written to it.
///
/// Used to drive the router without a network, and handy for embedding
/// the core behind a transport that polls for outgoing frames.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    failing: AtomicBool,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with an I/O error.
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Returns a copy of every frame written so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connection for MemoryConnection {
    fn send_text(&self, text: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Io("simulated write failure".to_string()));
        }

        let mut sent = self
            .sent
            .lock()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        sent.push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn peer(&self) -> String {
        "memory".to_string()
    }
}
