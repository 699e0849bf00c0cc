//! Decoding of frames received from customers.
//!
//! Customers type free text, so a text frame is normally the message
//! content verbatim. Clients that speak the wire format may instead send a
//! JSON object carrying a `content` string, in which case only that field
//! is kept. Binary frames are accepted when they hold UTF-8 text.

use serde::Deserialize;

use crate::ProtocolError;

/// Largest frame accepted by default (64 KiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// A data frame as handed over by the transport.
#[derive(Debug, Clone, Copy)]
pub enum InboundFrame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl InboundFrame<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Structured payload some clients send instead of plain text.
#[derive(Debug, Deserialize)]
struct InboundRecord {
    content: String,
}

/// Extracts the message content from an inbound frame.
///
/// # Errors
///
/// - `ProtocolError::FrameTooLarge` if the frame exceeds `max_size`
/// - `ProtocolError::InvalidUtf8` for binary frames that are not text
/// - `ProtocolError::EmptyPayload` if nothing but whitespace remains
pub fn decode_inbound(frame: InboundFrame<'_>, max_size: usize) -> Result<String, ProtocolError> {
    if frame.len() > max_size {
        return Err(ProtocolError::FrameTooLarge {
            size: frame.len(),
            max: max_size,
        });
    }

    let text = match frame {
        InboundFrame::Text(text) => text,
        InboundFrame::Binary(bytes) => {
            std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?
        }
    };

    let content = if text.trim_start().starts_with('{') {
        match serde_json::from_str::<InboundRecord>(text) {
            Ok(record) => record.content,
            Err(_) => text.to_string(),
        }
    } else {
        text.to_string()
    };

    if content.trim().is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }

    Ok(content)
}
