//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a paired device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which transport an agent uses to follow the lock state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Persistent WebSocket device channel
    #[default]
    Push,
    /// Periodic status fetch
    Poll,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Push => write!(f, "push"),
            Transport::Poll => write!(f, "poll"),
        }
    }
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "push" | "ws" | "websocket" => Ok(Transport::Push),
            "poll" | "http" => Ok(Transport::Poll),
            other => Err(format!("unknown transport '{}', expected push or poll", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_serializes_as_string() {
        let id = DeviceId::new("laptop-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""laptop-1""#);
        assert_eq!(id.to_string(), "laptop-1");
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("push".parse::<Transport>().unwrap(), Transport::Push);
        assert_eq!("POLL".parse::<Transport>().unwrap(), Transport::Poll);
        assert!("carrier-pigeon".parse::<Transport>().is_err());
    }
}
