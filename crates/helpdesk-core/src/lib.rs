//! Helpdesk Core - Shared types for the operator console and its customers
//!
//! This crate provides the domain types shared between the server
//! (helpdeskd) and the customer client (helpdesk).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod connection;
pub mod error;
pub mod message;
pub mod session;

// Re-exports for convenience
pub use connection::{Connection, MemoryConnection, TransportError};
pub use error::{DomainError, DomainResult};
pub use message::{Message, MessageKind};
pub use session::{Session, SessionId, SessionSummary, SESSION_ID_PREFIX};
