//! Device authentication
//!
//! Devices prove their identity with a shared secret issued at pairing time.
//! Each connection attempt carries a fresh assertion:
//!
//! ```text
//! signature = hex(HMAC-SHA256(secret, device_id ++ decimal(timestamp_ms)))
//! ```
//!
//! The server recomputes the MAC with the registered secret and compares it
//! in constant time, then checks that the timestamp is inside the freshness
//! window so a captured assertion cannot be replayed later.
//!
//! This module also holds the constant-time comparison used for the static
//! admin secret of the HTTP control surface.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;
use crate::time::within_window;
use crate::types::DeviceId;

type HmacSha256 = Hmac<Sha256>;

/// Default freshness window for assertion timestamps
pub const DEFAULT_AUTH_WINDOW: Duration = Duration::from_secs(60);

/// Length of generated secrets in bytes (before hex encoding)
const SECRET_BYTES: usize = 32;

/// Source of registered device secrets
pub trait SecretLookup {
    /// Secret bytes for `device_id`, or `None` if the device is unknown
    fn lookup_secret(&self, device_id: &str) -> Option<Vec<u8>>;
}

impl SecretLookup for HashMap<String, String> {
    fn lookup_secret(&self, device_id: &str) -> Option<Vec<u8>> {
        self.get(device_id).map(|s| s.as_bytes().to_vec())
    }
}

/// A paired device's identity and shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCredential {
    pub device_id: DeviceId,
    secret: String,
}

impl DeviceCredential {
    pub fn new(device_id: impl Into<DeviceId>, secret: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            secret: secret.into(),
        }
    }

    /// Raw secret bytes used as the HMAC key
    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredential")
            .field("device_id", &self.device_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl SecretLookup for DeviceCredential {
    fn lookup_secret(&self, device_id: &str) -> Option<Vec<u8>> {
        (self.device_id.as_str() == device_id).then(|| self.secret_bytes().to_vec())
    }
}

/// A signed, timestamped identity claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAssertion {
    pub device_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Hex-encoded HMAC-SHA256
    pub signature: String,
}

impl AuthAssertion {
    /// Sign a fresh assertion for `credential` at time `now` (ms)
    pub fn new(credential: &DeviceCredential, now: u64) -> Self {
        Self {
            device_id: credential.device_id.as_str().to_string(),
            timestamp: now,
            signature: sign(credential.secret_bytes(), credential.device_id.as_str(), now),
        }
    }
}

fn mac_for(secret: &[u8], device_id: &str, timestamp: u64) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(device_id.as_bytes());
    mac.update(timestamp.to_string().as_bytes());
    mac
}

/// Compute the hex signature for `device_id` at `timestamp`
pub fn sign(secret: &[u8], device_id: &str, timestamp: u64) -> String {
    hex::encode(mac_for(secret, device_id, timestamp).finalize().into_bytes())
}

/// Verify an assertion against the registered secrets.
///
/// Checks run in order: the device must be known, the signature must match,
/// and the timestamp must be within `window` of `now` in either direction.
/// The function has no side effects; callers decide what a rejection does
/// to their session.
pub fn verify<L>(
    assertion: &AuthAssertion,
    lookup: &L,
    now: u64,
    window: Duration,
) -> Result<DeviceId, AuthError>
where
    L: SecretLookup + ?Sized,
{
    let secret = lookup
        .lookup_secret(&assertion.device_id)
        .ok_or(AuthError::UnknownDevice)?;

    let provided = hex::decode(&assertion.signature).map_err(|_| AuthError::BadSignature)?;
    mac_for(&secret, &assertion.device_id, assertion.timestamp)
        .verify_slice(&provided)
        .map_err(|_| AuthError::BadSignature)?;

    if !within_window(now, assertion.timestamp, window) {
        return Err(AuthError::StaleTimestamp);
    }

    Ok(DeviceId::new(assertion.device_id.clone()))
}

/// Generate a new random secret
///
/// Returns a 64-character hex string (32 random bytes)
pub fn generate_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Compare a presented static secret against the expected one.
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn validate_secret(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}
