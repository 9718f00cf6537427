//! Global server state

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use rl_core::config::ServerConfig;

use crate::auth::DeviceRegistry;
use crate::connection::SessionPool;
use crate::coordinator::LockCoordinator;

/// State shared by every request handler and device channel
pub struct ServerState {
    /// Configuration
    pub config: ServerConfig,
    /// Lock state owner
    pub coordinator: Arc<LockCoordinator>,
    /// Registered device secrets
    pub devices: Arc<DeviceRegistry>,
    /// Open device channels
    pub sessions: Arc<SessionPool>,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl ServerState {
    /// Create server state; devices come from the `[devices]` config table
    pub fn new(config: ServerConfig, admin_secret: impl Into<String>) -> Self {
        let coordinator = LockCoordinator::new(admin_secret, config.broadcast_capacity);
        let devices = DeviceRegistry::from_map(&config.devices);
        Self {
            config,
            coordinator: Arc::new(coordinator),
            devices: Arc::new(devices),
            sessions: Arc::new(SessionPool::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally owned shutdown token
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}
