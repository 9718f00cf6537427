//! Pool of open device channels

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use rl_core::time::current_time_millis;
use rl_core::DeviceId;
use rl_protocol::DeviceInfo;

/// One open device channel
pub struct DeviceSession {
    /// Connection identifier
    pub id: Uuid,
    /// Remote address of the agent
    pub peer: SocketAddr,
    /// Connect time (ms since the Unix epoch)
    pub connected_at: u64,
    /// Set once, when `AUTH` succeeds
    device_id: OnceLock<DeviceId>,
    /// Last inbound message (ms since the Unix epoch)
    last_seen: AtomicU64,
}

impl DeviceSession {
    fn new(peer: SocketAddr) -> Self {
        let now = current_time_millis();
        Self {
            id: Uuid::new_v4(),
            peer,
            connected_at: now,
            device_id: OnceLock::new(),
            last_seen: AtomicU64::new(now),
        }
    }

    /// The authenticated device, if any
    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.get()
    }

    /// Whether the handshake completed
    pub fn is_authenticated(&self) -> bool {
        self.device_id.get().is_some()
    }

    /// Bind the session to a device. A session authenticates at most once;
    /// later calls return false and leave the binding unchanged.
    pub fn authenticate(&self, device_id: DeviceId) -> bool {
        self.device_id.set(device_id).is_ok()
    }

    /// Record inbound traffic
    pub fn touch(&self) {
        self.last_seen.store(current_time_millis(), Ordering::Relaxed);
    }

    /// Last inbound message (ms since the Unix epoch)
    pub fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::Relaxed)
    }

    /// Snapshot for the devices endpoint
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            session_id: self.id.to_string(),
            device_id: self.device_id().map(|id| id.as_str().to_string()),
            peer: self.peer.to_string(),
            connected_at: self.connected_at,
            last_seen: self.last_seen(),
        }
    }
}

/// Open device channels indexed by session id
pub struct SessionPool {
    sessions: DashMap<Uuid, Arc<DeviceSession>>,
}

impl SessionPool {
    /// Create a new empty pool
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Register a newly opened channel
    pub fn open(&self, peer: SocketAddr) -> Arc<DeviceSession> {
        let session = Arc::new(DeviceSession::new(peer));
        self.sessions.insert(session.id, Arc::clone(&session));
        session
    }

    /// Forget a closed channel
    pub fn close(&self, id: &Uuid) -> Option<Arc<DeviceSession>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Get a session by id
    pub fn get(&self, id: &Uuid) -> Option<Arc<DeviceSession>> {
        self.sessions.get(id).map(|r| Arc::clone(&r))
    }

    /// Snapshots of all open channels, oldest first
    pub fn list(&self) -> Vec<DeviceInfo> {
        let mut infos: Vec<DeviceInfo> = self.sessions.iter().map(|r| r.info()).collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    /// Number of authenticated channels
    pub fn authenticated_count(&self) -> usize {
        self.sessions.iter().filter(|r| r.is_authenticated()).count()
    }

    /// Number of open channels
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}
