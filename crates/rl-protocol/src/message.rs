//! Message types for the device channel
//!
//! Messages are JSON objects carried in WebSocket text frames, tagged by a
//! `type` field. They are decoded once at the boundary into
//! [`ChannelMessage`]; everything downstream matches on the variant.
//!
//! # Message Flow
//!
//! 1. Agent connects and sends `AUTH` with a signed, timestamped assertion
//! 2. Server responds with `AUTH_OK`, or `ERROR` followed by a close frame
//! 3. Agent sends `PING` periodically, server responds with `PONG`
//! 4. Whenever the lock state changes, the server pushes `LOCK` or `UNLOCK`
//!    to every authenticated session
//!
//! Commands are fire-and-forget. A `LOCK` pushed while an agent is
//! disconnected is not replayed on reconnect.

use serde::{Deserialize, Serialize};

use crate::state::LockState;

/// WebSocket close codes used by the server.
pub mod close_code {
    /// No traffic within the idle timeout
    pub const IDLE_TIMEOUT: u16 = 4000;
    /// `AUTH` was rejected by the verifier
    pub const AUTH_REJECTED: u16 = 4401;
    /// No `AUTH` arrived within the auth timeout
    pub const AUTH_TIMEOUT: u16 = 4408;

    /// Whether a close code means the credential itself was refused.
    pub fn is_auth_failure(code: u16) -> bool {
        code == AUTH_REJECTED
    }
}

/// Message type identifier, matching the wire `type` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Auth,
    AuthOk,
    Error,
    Lock,
    Unlock,
    Ping,
    Pong,
}

impl MessageType {
    /// The wire tag for this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "AUTH",
            Self::AuthOk => "AUTH_OK",
            Self::Error => "ERROR",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        }
    }
}

/// Device channel messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelMessage {
    /// Signed identity assertion (agent → server)
    Auth {
        #[serde(rename = "deviceId")]
        device_id: String,
        /// Hex-encoded HMAC-SHA256 over `device_id ++ decimal(timestamp)`
        signature: String,
        /// Milliseconds since the Unix epoch
        timestamp: u64,
    },

    /// Authentication accepted (server → agent)
    AuthOk {
        #[serde(rename = "deviceId")]
        device_id: String,
    },

    /// Error report (server → agent)
    Error { error: String },

    /// Raise the lock (server → agent)
    Lock {
        /// Text to show on the lock surface
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Lower the lock (server → agent)
    Unlock,

    /// Keepalive (agent → server)
    Ping,

    /// Keepalive response (server → agent)
    Pong,
}

impl ChannelMessage {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            ChannelMessage::Auth { .. } => MessageType::Auth,
            ChannelMessage::AuthOk { .. } => MessageType::AuthOk,
            ChannelMessage::Error { .. } => MessageType::Error,
            ChannelMessage::Lock { .. } => MessageType::Lock,
            ChannelMessage::Unlock => MessageType::Unlock,
            ChannelMessage::Ping => MessageType::Ping,
            ChannelMessage::Pong => MessageType::Pong,
        }
    }

    /// The command that delivers `state` to an agent
    pub fn command_for(state: &LockState) -> Self {
        if state.locked {
            ChannelMessage::Lock {
                message: Some(state.message.clone()),
            }
        } else {
            ChannelMessage::Unlock
        }
    }

    /// Build an `ERROR` message
    pub fn error(error: impl Into<String>) -> Self {
        ChannelMessage::Error {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_wire_format() {
        let msg = ChannelMessage::Auth {
            device_id: "laptop-1".to_string(),
            signature: "ab12".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "AUTH");
        assert_eq!(value["deviceId"], "laptop-1");
        assert_eq!(value["signature"], "ab12");
        assert_eq!(value["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_auth_ok_uses_snake_tag() {
        let json = serde_json::to_string(&ChannelMessage::AuthOk {
            device_id: "d".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"AUTH_OK","deviceId":"d"}"#);
    }

    #[test]
    fn test_bare_lock_decodes_without_message() {
        let msg: ChannelMessage = serde_json::from_str(r#"{"type":"LOCK"}"#).unwrap();
        assert_eq!(msg, ChannelMessage::Lock { message: None });
    }

    #[test]
    fn test_unit_variants_tolerate_empty_body() {
        let msg: ChannelMessage = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(msg, ChannelMessage::Ping);
        let json = serde_json::to_string(&ChannelMessage::Unlock).unwrap();
        assert_eq!(json, r#"{"type":"UNLOCK"}"#);
    }

    #[test]
    fn test_message_type_tags_match_wire() {
        let msgs = [
            ChannelMessage::Ping,
            ChannelMessage::Pong,
            ChannelMessage::Unlock,
            ChannelMessage::Lock { message: None },
            ChannelMessage::error("x"),
            ChannelMessage::AuthOk {
                device_id: "d".to_string(),
            },
        ];
        for msg in msgs {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.message_type().as_str());
        }
    }

    #[test]
    fn test_command_for_state() {
        let mut state = LockState::default();
        assert_eq!(ChannelMessage::command_for(&state), ChannelMessage::Unlock);

        state.locked = true;
        state.message = "away".to_string();
        assert_eq!(
            ChannelMessage::command_for(&state),
            ChannelMessage::Lock {
                message: Some("away".to_string())
            }
        );
    }

    #[test]
    fn test_auth_close_code() {
        assert!(close_code::is_auth_failure(close_code::AUTH_REJECTED));
        assert!(!close_code::is_auth_failure(close_code::IDLE_TIMEOUT));
        assert!(!close_code::is_auth_failure(1000));
    }
}
