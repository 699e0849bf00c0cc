//! Helpdesk Protocol - Wire format for customer connections
//!
//! Every frame the server writes is one JSON wire message
//! (`{from, content, timestamp, type}`). Customers may answer with plain
//! text or with a wire message of their own; `frame` turns either into
//! the content the router logs.

pub mod codec;
pub mod frame;

pub use codec::{decode_message, encode_message, ProtocolError};
pub use frame::{decode_inbound, InboundFrame, DEFAULT_MAX_FRAME_SIZE};
