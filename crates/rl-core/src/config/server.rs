//! Server configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::auth::DEFAULT_AUTH_WINDOW;

/// Configuration for the rendezvous server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP/WebSocket listener to
    pub bind_address: String,

    /// Static admin secret for the control surface.
    ///
    /// When unset, the server generates a random one at startup.
    pub admin_secret: Option<String>,

    /// Maximum clock skew accepted on device assertions
    #[serde(with = "duration_secs")]
    pub auth_window: Duration,

    /// How long a new device channel may stay unauthenticated
    #[serde(with = "duration_secs")]
    pub auth_timeout: Duration,

    /// Close a device channel after this long without traffic
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Directory holding the admin panel (served for unmatched GETs)
    pub static_dir: Option<PathBuf>,

    /// Capacity of the lock state broadcast channel
    pub broadcast_capacity: usize,

    /// Registered devices: device id → shared secret
    pub devices: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            admin_secret: None,
            auth_window: DEFAULT_AUTH_WINDOW,
            auth_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            static_dir: None,
            broadcast_capacity: 64,
            devices: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Replace the port of `bind_address`, keeping its host
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.bind_address = format!("{}:{}", host, port);
    }
}
