//! Agent configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::auth::DeviceCredential;
use crate::error::ConfigError;
use crate::types::Transport;

/// Configuration for the device agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the server (http:// or https://)
    pub server_url: String,

    /// Device identity issued at pairing time
    pub device_id: String,

    /// Shared secret issued at pairing time
    pub secret: String,

    /// How the agent follows the lock state
    pub transport: Transport,

    /// Interval between status fetches in poll mode
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,

    /// Timeout for a single HTTP request
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Interval between keepalive pings in push mode
    #[serde(with = "duration_secs")]
    pub ping_interval: Duration,

    /// Drop the device channel after this long without any traffic
    #[serde(with = "duration_secs")]
    pub liveness_timeout: Duration,

    /// Timeout for opening the device channel
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Log a connectivity alarm after this many consecutive poll failures
    pub failure_alarm_threshold: u32,

    /// Backoff configuration for reconnections
    pub backoff: BackoffConfig,

    /// Log platform lock/unlock instead of executing them
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            device_id: String::new(),
            secret: String::new(),
            transport: Transport::Push,
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
            liveness_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            failure_alarm_threshold: 5,
            backoff: BackoffConfig::default(),
            dry_run: false,
        }
    }
}

impl AgentConfig {
    /// The device credential, if both halves are configured
    pub fn credential(&self) -> Result<DeviceCredential, ConfigError> {
        if self.device_id.trim().is_empty() {
            return Err(ConfigError::MissingField("device_id".to_string()));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::MissingField("secret".to_string()));
        }
        Ok(DeviceCredential::new(
            self.device_id.trim(),
            self.secret.clone(),
        ))
    }

    /// Server URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// URL of the device channel endpoint
    pub fn websocket_url(&self) -> Result<String, ConfigError> {
        let base = self.base_url();
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(ConfigError::Invalid(format!(
                "server_url must start with http:// or https://, got '{}'",
                self.server_url
            )));
        };
        Ok(format!("{}/ws", ws))
    }

    /// URL of the status endpoint; a ws:// or wss:// server URL maps to
    /// http:// or https://
    pub fn status_url(&self) -> String {
        let base = self.base_url();
        let http = if let Some(rest) = base.strip_prefix("wss://") {
            format!("https://{}", rest)
        } else if let Some(rest) = base.strip_prefix("ws://") {
            format!("http://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/api/status", http)
    }

    /// Reject settings the agent loops cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.websocket_url()?;

        for (name, value) in [
            ("poll_interval", self.poll_interval),
            ("request_timeout", self.request_timeout),
            ("ping_interval", self.ping_interval),
            ("liveness_timeout", self.liveness_timeout),
            ("connect_timeout", self.connect_timeout),
            ("backoff.initial", self.backoff.initial),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }

        self.backoff.validate()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_secs")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_secs")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl BackoffConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff.multiplier must be a finite number of at least 1.0, got {}",
                self.multiplier
            )));
        }
        if !self.jitter.is_finite() || !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "backoff.jitter must be between 0.0 and 1.0, got {}",
                self.jitter
            )));
        }
        if self.max < self.initial {
            return Err(ConfigError::Invalid(format!(
                "backoff.max ({:?}) is below backoff.initial ({:?})",
                self.max, self.initial
            )));
        }
        Ok(())
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.ping_interval, Duration::from_secs(20));
        assert_eq!(config.backoff.initial, Duration::from_secs(2));
        assert_eq!(config.backoff.max, Duration::from_secs(60));
        assert_eq!(config.transport, Transport::Push);
    }

    #[test]
    fn test_credential_requires_both_fields() {
        let mut config = AgentConfig::default();
        assert!(matches!(
            config.credential(),
            Err(ConfigError::MissingField(f)) if f == "device_id"
        ));

        config.device_id = "laptop".to_string();
        assert!(matches!(
            config.credential(),
            Err(ConfigError::MissingField(f)) if f == "secret"
        ));

        config.secret = "s".to_string();
        assert_eq!(config.credential().unwrap().device_id.as_str(), "laptop");
    }

    #[test]
    fn test_websocket_url() {
        let mut config = AgentConfig::default();
        config.server_url = "https://lock.example.com/".to_string();
        assert_eq!(config.websocket_url().unwrap(), "wss://lock.example.com/ws");

        config.server_url = "http://127.0.0.1:8000".to_string();
        assert_eq!(config.websocket_url().unwrap(), "ws://127.0.0.1:8000/ws");

        config.server_url = "lock.example.com".to_string();
        assert!(config.websocket_url().is_err());
    }

    #[test]
    fn test_status_url_strips_trailing_slash() {
        let mut config = AgentConfig::default();
        config.server_url = "http://host:1/".to_string();
        assert_eq!(config.status_url(), "http://host:1/api/status");
    }

    #[test]
    fn test_status_url_from_websocket_scheme() {
        let mut config = AgentConfig::default();
        config.server_url = "ws://host:1".to_string();
        assert_eq!(config.status_url(), "http://host:1/api/status");

        config.server_url = "wss://lock.example.com/".to_string();
        assert_eq!(config.status_url(), "https://lock.example.com/api/status");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let config: AgentConfig = toml::from_str("poll_interval = 0").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("poll_interval")
        ));

        let mut config = AgentConfig::default();
        config.ping_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.backoff.initial = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        for multiplier in [0.5, -2.0, f64::NAN, f64::INFINITY] {
            let mut config = AgentConfig::default();
            config.backoff.multiplier = multiplier;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(msg)) if msg.contains("multiplier")),
                "multiplier {} accepted",
                multiplier
            );
        }

        let mut config = AgentConfig::default();
        config.backoff.jitter = 1.5;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.backoff.initial = Duration::from_secs(30);
        config.backoff.max = Duration::from_secs(10);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("backoff.max")
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_scheme() {
        let mut config = AgentConfig::default();
        config.server_url = "ftp://host".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            server_url = "https://lock.example.com"
            device_id = "laptop"
            secret = "abc"
            transport = "poll"

            [backoff]
            initial = 1
            max = 30
            multiplier = 2.0
            jitter = 0.0
        "#;
        let config: AgentConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.transport, Transport::Poll);
        assert_eq!(config.backoff.max, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }
}
