//! Core error types for remote-lock

use rl_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the remote-lock ecosystem
#[derive(Error, Debug)]
pub enum RlError {
    /// Device authentication failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Admin credential rejected
    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed message
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Host lock/unlock failed
    #[error("Platform action failed: {0}")]
    Platform(#[from] PlatformActionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a device assertion is rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No secret is registered for the device
    #[error("unknown device")]
    UnknownDevice,

    /// Signature is malformed or does not match
    #[error("bad signature")]
    BadSignature,

    /// Timestamp is outside the freshness window
    #[error("stale timestamp")]
    StaleTimestamp,
}

/// Admin secret mismatch
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Forbidden: invalid secret")]
pub struct ForbiddenError;

/// Connection-level failures; these hand control to the reconnect scheduler
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Connection dropped
    #[error("Connection closed: {0}")]
    Closed(String),

    /// No traffic within the liveness timeout
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// HTTP request failed or returned an unexpected status
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Host lock/unlock failures; terminal for the single command that caused them
#[derive(Error, Debug)]
pub enum PlatformActionError {
    /// The OS command ran and failed, or could not be spawned
    #[error("`{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// The OS command did not finish in time
    #[error("`{0}` timed out")]
    Timeout(String),

    /// The platform has no way to perform this action
    #[error("{action} is not supported on {os}")]
    Unsupported { action: &'static str, os: &'static str },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_reason_strings() {
        assert_eq!(AuthError::UnknownDevice.to_string(), "unknown device");
        assert_eq!(AuthError::BadSignature.to_string(), "bad signature");
        assert_eq!(AuthError::StaleTimestamp.to_string(), "stale timestamp");
    }

    #[test]
    fn test_forbidden_message() {
        assert_eq!(ForbiddenError.to_string(), "Forbidden: invalid secret");
        let err: RlError = ForbiddenError.into();
        assert_eq!(err.to_string(), "Forbidden: invalid secret");
    }
}
