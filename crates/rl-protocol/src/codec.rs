//! JSON text codec for device channel messages

use crate::error::ProtocolError;
use crate::message::ChannelMessage;

/// Maximum accepted size of a single text message
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Decode a text frame into a [`ChannelMessage`]
pub fn decode(text: &str) -> Result<ChannelMessage, ProtocolError> {
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let message = serde_json::from_str(text)?;
    Ok(message)
}

/// Encode a [`ChannelMessage`] as a text frame
pub fn encode(message: &ChannelMessage) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(message).map_err(ProtocolError::Encode)?;

    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: text.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(text)
}

/// Check that a lock message fits in a single `LOCK` frame
pub fn check_lock_message(message: &str) -> Result<(), ProtocolError> {
    encode(&ChannelMessage::Lock {
        message: Some(message.to_string()),
    })
    .map(|_| ())
}
