//! Registered device secrets

use dashmap::DashMap;
use std::collections::HashMap;

use rl_core::SecretLookup;

/// Device id → shared secret, shared across request handlers
pub struct DeviceRegistry {
    secrets: DashMap<String, String>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            secrets: DashMap::new(),
        }
    }

    /// Build a registry from the `[devices]` table of the server config
    pub fn from_map(devices: &HashMap<String, String>) -> Self {
        let registry = Self::new();
        for (device_id, secret) in devices {
            registry.register(device_id.clone(), secret.clone());
        }
        registry
    }

    /// Register or replace a device secret
    pub fn register(&self, device_id: impl Into<String>, secret: impl Into<String>) {
        let device_id = device_id.into();
        tracing::debug!("Registered device {}", device_id);
        self.secrets.insert(device_id, secret.into());
    }

    /// Whether a device is registered
    pub fn contains(&self, device_id: &str) -> bool {
        self.secrets.contains_key(device_id)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Check if no device is registered
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretLookup for DeviceRegistry {
    fn lookup_secret(&self, device_id: &str) -> Option<Vec<u8>> {
        self.secrets
            .get(device_id)
            .map(|secret| secret.as_bytes().to_vec())
    }
}
