//! JSON encoding of wire messages.

use helpdesk_core::Message;
use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Empty payload")]
    EmptyPayload,

    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Serializes a message into the text of one frame.
pub fn encode_message(message: &Message) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Parses the text of one frame into a message.
pub fn decode_message(text: &str) -> Result<Message, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}
