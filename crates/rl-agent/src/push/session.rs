//! Agent side of the device channel handshake
//!
//! ```text
//! Connecting --open--> Authenticating --AUTH_OK--> Authenticated
//!                           |                           |
//!                           +--ERROR / auth close--+    +--close / timeout--+
//!                                                  v                        v
//!                                                Closed                   Closed
//! ```
//!
//! [`PushSession`] does no I/O. The connector feeds it decoded messages and
//! close events and acts on the returned [`SessionEvent`].

use tokio::time::Instant;

use rl_core::auth::AuthAssertion;
use rl_core::DeviceCredential;
use rl_protocol::state::DEFAULT_LOCK_MESSAGE;
use rl_protocol::{close_code, ChannelMessage};

/// Where the handshake stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Authenticated,
    Closed(CloseReason),
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The server refused the credential
    AuthRejected(String),
    /// The connection went away
    Disconnected(String),
    /// No traffic within the liveness timeout
    LivenessTimeout,
    /// Local shutdown
    Shutdown,
}

/// What the connector should do in response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Nothing
    None,
    /// Handshake finished: start keepalive, reset the reconnect delay
    Authenticated,
    /// Raise the lock with this message
    Lock(String),
    /// Lower the lock
    Unlock,
    /// The credential was refused; do not retry it as-is
    Rejected(String),
}

/// One device channel's protocol state
pub struct PushSession {
    credential: DeviceCredential,
    state: SessionState,
    last_pong_at: Option<Instant>,
}

impl PushSession {
    pub fn new(credential: DeviceCredential) -> Self {
        Self {
            credential,
            state: SessionState::Connecting,
            last_pong_at: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// When the last `PONG` arrived
    pub fn last_pong_at(&self) -> Option<Instant> {
        self.last_pong_at
    }

    /// The transport is open: produce the `AUTH` message signed at `now` (ms)
    pub fn open(&mut self, now: u64) -> ChannelMessage {
        let assertion = AuthAssertion::new(&self.credential, now);
        self.state = SessionState::Authenticating;
        ChannelMessage::Auth {
            device_id: assertion.device_id,
            signature: assertion.signature,
            timestamp: assertion.timestamp,
        }
    }

    /// Handle one decoded server message
    pub fn on_message(&mut self, message: ChannelMessage) -> SessionEvent {
        if matches!(self.state, SessionState::Closed(_)) {
            return SessionEvent::None;
        }
        let authenticating = self.state == SessionState::Authenticating;
        let authenticated = self.is_authenticated();

        match message {
            ChannelMessage::AuthOk { device_id } if authenticating => {
                if device_id != self.credential.device_id.as_str() {
                    tracing::warn!(
                        "Server confirmed device {}, expected {}",
                        device_id,
                        self.credential.device_id
                    );
                }
                self.state = SessionState::Authenticated;
                SessionEvent::Authenticated
            }

            ChannelMessage::Error { error } if authenticating => {
                self.state = SessionState::Closed(CloseReason::AuthRejected(error.clone()));
                SessionEvent::Rejected(error)
            }

            ChannelMessage::Error { error } if authenticated => {
                tracing::warn!("Server reported an error: {}", error);
                SessionEvent::None
            }

            ChannelMessage::Lock { message } if authenticated => {
                SessionEvent::Lock(message.unwrap_or_else(|| DEFAULT_LOCK_MESSAGE.to_string()))
            }

            ChannelMessage::Unlock if authenticated => SessionEvent::Unlock,

            ChannelMessage::Pong => {
                self.last_pong_at = Some(Instant::now());
                SessionEvent::None
            }

            other => {
                tracing::debug!(
                    "Ignoring {} while {:?}",
                    other.message_type().as_str(),
                    self.state
                );
                SessionEvent::None
            }
        }
    }

    /// The server closed the channel
    pub fn on_close(&mut self, code: Option<u16>, reason: &str) -> SessionEvent {
        if matches!(self.state, SessionState::Closed(_)) {
            return SessionEvent::None;
        }

        if code.map_or(false, close_code::is_auth_failure) {
            self.state = SessionState::Closed(CloseReason::AuthRejected(reason.to_string()));
            return SessionEvent::Rejected(reason.to_string());
        }

        let detail = match code {
            Some(code) => format!("closed by server ({}): {}", code, reason),
            None => "connection lost".to_string(),
        };
        self.state = SessionState::Closed(CloseReason::Disconnected(detail));
        SessionEvent::None
    }

    /// Close locally for inactivity or shutdown
    pub fn close(&mut self, reason: CloseReason) {
        if !matches!(self.state, SessionState::Closed(_)) {
            self.state = SessionState::Closed(reason);
        }
    }
}
