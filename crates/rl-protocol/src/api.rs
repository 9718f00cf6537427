//! Request and response bodies for the HTTP control surface

use serde::{Deserialize, Serialize};

use crate::state::LockState;

/// Header carrying the admin secret
pub const ADMIN_SECRET_HEADER: &str = "X-Lock-Secret";

/// Query parameter carrying the admin secret (alternative to the header)
pub const ADMIN_SECRET_QUERY: &str = "secret";

/// Device assertion headers sent with an authenticated status fetch
pub const DEVICE_ID_HEADER: &str = "X-Device-Id";
pub const DEVICE_TIMESTAMP_HEADER: &str = "X-Device-Timestamp";
pub const DEVICE_SIGNATURE_HEADER: &str = "X-Device-Signature";

/// Body of `POST /api/lock` and `POST /api/message`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Successful mutation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    pub state: LockState,
}

impl ApiResponse {
    pub fn ok(state: LockState) -> Self {
        Self { ok: true, state }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub ok: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

/// A device channel currently open on the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Connection identifier
    pub session_id: String,
    /// Authenticated device, if the handshake completed
    pub device_id: Option<String>,
    /// Remote address of the agent
    pub peer: String,
    /// Connect time (ms since the Unix epoch)
    pub connected_at: u64,
    /// Last message time (ms since the Unix epoch)
    pub last_seen: u64,
}

/// Response of `GET /api/devices`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub ok: bool,
    pub devices: Vec<DeviceInfo>,
}
