//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding channel messages.
///
/// Every variant is a per-message failure: the connection that produced the
/// message stays open and the message is dropped.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message exceeds maximum size
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// Malformed JSON or unknown message type
    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Serialization failure on the sending side
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Non-text frame on a text-only channel
    #[error("Unsupported frame: {0}")]
    UnsupportedFrame(&'static str),
}
