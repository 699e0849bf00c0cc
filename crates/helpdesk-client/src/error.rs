//! Error types for the customer client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io;
use thiserror::Error;

/// Customer client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Could not reach the server.
    ///
    /// Usually the server is not running or the URL (or its path) is wrong;
    /// a wrong path is answered with HTTP 404.
    #[error("Failed to connect to {url}: {error}")]
    Connect { url: String, error: String },

    /// The WebSocket failed after connecting.
    #[error("Connection error: {0}")]
    Transport(String),

    /// Reading input or writing to the terminal failed.
    #[error("Terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
