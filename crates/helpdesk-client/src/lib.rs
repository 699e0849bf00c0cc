//! helpdesk customer client
//!
//! Connects to the helpdesk server over WebSocket and turns a terminal into
//! a chat window: server messages are printed as they arrive, typed lines
//! are sent as they are entered.
//!
//! - `client` - Connection, receive/send loop and shutdown
//! - `render` - How incoming messages look on screen
//! - `error` - Client error type

pub mod client;
pub mod error;
pub mod render;

pub use client::{ClientConfig, ClientExit, CustomerClient, DEFAULT_SERVER_URL};
pub use error::{ClientError, Result};
