//! Device channel liveness
//!
//! A fresh channel must authenticate within the auth timeout. After that it
//! stays open only while traffic keeps arriving within the idle timeout;
//! agents send `PING` well inside that window.

use std::time::Duration;
use tokio::time::Instant;

use rl_protocol::close_code;

/// Why a channel's deadline passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// No `AUTH` arrived in time
    AuthTimeout,
    /// No traffic in time
    IdleTimeout,
}

impl Expiry {
    /// Close code sent to the agent
    pub fn close_code(&self) -> u16 {
        match self {
            Expiry::AuthTimeout => close_code::AUTH_TIMEOUT,
            Expiry::IdleTimeout => close_code::IDLE_TIMEOUT,
        }
    }

    /// Close reason sent to the agent
    pub fn reason(&self) -> &'static str {
        match self {
            Expiry::AuthTimeout => "auth timeout",
            Expiry::IdleTimeout => "idle timeout",
        }
    }
}

/// Tracks when a channel must be closed for inactivity
#[derive(Debug, Clone)]
pub struct Liveness {
    auth_timeout: Duration,
    idle_timeout: Duration,
    opened_at: Instant,
    last_seen: Instant,
}

impl Liveness {
    /// Start tracking a channel opened now
    pub fn new(auth_timeout: Duration, idle_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            auth_timeout,
            idle_timeout,
            opened_at: now,
            last_seen: now,
        }
    }

    /// Record inbound traffic
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// The next deadline and what it means
    pub fn deadline(&self, authenticated: bool) -> (Instant, Expiry) {
        if authenticated {
            (self.last_seen + self.idle_timeout, Expiry::IdleTimeout)
        } else {
            (self.opened_at + self.auth_timeout, Expiry::AuthTimeout)
        }
    }
}
