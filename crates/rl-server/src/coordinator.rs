//! Lock coordinator: the single owner of the canonical lock state
//!
//! The `LockCoordinator` holds the process-wide [`LockState`] behind a
//! `RwLock<Arc<LockState>>`. Readers clone the `Arc` and get a whole,
//! immutable snapshot. Writers build a fresh instance and swap it in while
//! holding the write lock, so concurrent admin calls serialize and the last
//! one to complete wins.
//!
//! # Broadcast
//!
//! Every successful mutation is published on a broadcast channel while the
//! write lock is still held. Subscribers therefore see updates in exactly
//! the order they were applied. Device channel tasks subscribe and forward
//! the new state to their agent once it has authenticated.
//!
//! # Authorization
//!
//! Mutations take the credential presented by the caller and compare it to
//! the configured admin secret in constant time before touching the state.
//! A new lock message must also fit in one `LOCK` frame.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

use rl_core::auth::validate_secret;
use rl_core::time::current_time_millis;
use rl_core::ForbiddenError;
use rl_protocol::{check_lock_message, LockState, ProtocolError};

/// Why a mutation was refused; the state is unchanged in both cases
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Forbidden(#[from] ForbiddenError),

    /// The message would not fit in a device channel frame
    #[error("Lock message too large: {0}")]
    MessageTooLarge(ProtocolError),
}

/// Default capacity of the state broadcast channel
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Owns the lock state and fans out changes to device channels.
pub struct LockCoordinator {
    /// Current snapshot; replaced wholesale on every mutation
    state: RwLock<Arc<LockState>>,
    /// Configured admin secret
    admin_secret: String,
    /// Change notifications
    updates: broadcast::Sender<Arc<LockState>>,
}

impl LockCoordinator {
    /// Create a coordinator with the default initial state
    pub fn new(admin_secret: impl Into<String>, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(Arc::new(LockState::default())),
            admin_secret: admin_secret.into(),
            updates,
        }
    }

    /// Immutable snapshot of the current state
    pub async fn get_state(&self) -> LockState {
        LockState::clone(&*self.snapshot().await)
    }

    /// Shared handle to the current snapshot
    pub async fn snapshot(&self) -> Arc<LockState> {
        Arc::clone(&*self.state.read().await)
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LockState>> {
        self.updates.subscribe()
    }

    /// Lock or unlock.
    ///
    /// When locking, `message` replaces the lock message if given. Both
    /// directions stamp `triggered_at` and `triggered_by`.
    pub async fn set_locked(
        &self,
        credential: Option<&str>,
        locked: bool,
        message: Option<String>,
        actor: &str,
    ) -> Result<LockState, MutationError> {
        self.authorize(credential)?;
        if let (true, Some(message)) = (locked, &message) {
            check_message(message)?;
        }

        let now = current_time_millis();
        let state = self
            .apply(|current| LockState {
                locked,
                message: match (locked, message) {
                    (true, Some(message)) => message,
                    _ => current.message.clone(),
                },
                triggered_at: Some(now),
                triggered_by: Some(actor.to_string()),
            })
            .await;

        tracing::info!(
            "Lock state changed: locked={} by {} ({} device channel(s) listening)",
            state.locked,
            actor,
            self.updates.receiver_count()
        );
        Ok(state)
    }

    /// Replace the lock message without changing the lock itself.
    ///
    /// `None` leaves the message as it is.
    pub async fn set_message(
        &self,
        credential: Option<&str>,
        message: Option<String>,
    ) -> Result<LockState, MutationError> {
        self.authorize(credential)?;
        if let Some(message) = &message {
            check_message(message)?;
        }

        let state = self
            .apply(|current| LockState {
                message: message.unwrap_or_else(|| current.message.clone()),
                ..current.clone()
            })
            .await;

        tracing::info!("Lock message updated");
        Ok(state)
    }

    /// Check a presented admin credential
    pub fn authorize(&self, credential: Option<&str>) -> Result<(), ForbiddenError> {
        match credential {
            Some(provided) if validate_secret(provided, &self.admin_secret) => Ok(()),
            _ => {
                tracing::warn!("Rejected admin request with invalid secret");
                Err(ForbiddenError)
            }
        }
    }

    /// Swap in the state computed from the current one and publish it
    async fn apply<F>(&self, next: F) -> LockState
    where
        F: FnOnce(&LockState) -> LockState,
    {
        let mut guard = self.state.write().await;
        let updated = Arc::new(next(&guard));
        *guard = Arc::clone(&updated);

        // No receivers just means no device channel is open
        let _ = self.updates.send(Arc::clone(&updated));

        LockState::clone(&updated)
    }
}

fn check_message(message: &str) -> Result<(), MutationError> {
    check_lock_message(message).map_err(|e| {
        tracing::warn!("Rejected lock message: {}", e);
        MutationError::MessageTooLarge(e)
    })
}
