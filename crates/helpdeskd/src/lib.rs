//! helpdesk server - one operator console, many WebSocket customers
//!
//! This crate provides the server-side infrastructure:
//! - `registry` - Concurrent directory of live customer sessions
//! - `router` - Active-target selection and message routing
//! - `server` - WebSocket listener and per-connection handlers
//! - `console` - Operator command parsing, execution and rendering
//! - `config` - Server configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      helpdeskd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   ChatServer    │────▶│          Router             │   │
//! │  │  (WebSocket)    │     │ (registry + active target)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ connections                 │ ChatEvent         │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionHandler│     │      Operator console       │   │
//! │  │ (per customer)  │     │  (commands in, events out)  │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod console;
pub mod registry;
pub mod router;
pub mod server;
