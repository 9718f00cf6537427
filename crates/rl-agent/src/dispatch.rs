//! Fan-out of lock decisions to the host and the lock surface

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::platform::PlatformAction;
use crate::ui::UiHandle;

/// Applies a lock decision made by the push or poll loop.
///
/// Tracks whether the host is locked so the platform action only runs when
/// that changes. Raising while already locked only updates the message on
/// the surface. The state outlives any single connection: a dropped
/// transport never lowers the surface.
#[derive(Clone)]
pub struct Dispatcher {
    platform: Arc<dyn PlatformAction>,
    ui: UiHandle,
    locked: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(platform: Arc<dyn PlatformAction>, ui: UiHandle) -> Self {
        Self {
            platform,
            ui,
            locked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Raise the lock surface and lock the host
    pub async fn raise(&self, message: &str) {
        let was_locked = self.locked.swap(true, Ordering::SeqCst);
        self.ui.raise(message);

        if was_locked {
            tracing::info!("Lock message updated");
            return;
        }

        tracing::info!("Locking: {}", message.lines().next().unwrap_or_default());
        if let Err(e) = self.platform.lock().await {
            tracing::warn!("Platform lock failed: {}", e);
        }
    }

    /// Lower the lock surface and unlock the host
    pub async fn lower(&self) {
        if !self.locked.swap(false, Ordering::SeqCst) {
            tracing::debug!("Already unlocked");
            return;
        }

        tracing::info!("Unlocking");
        self.ui.lower();
        if let Err(e) = self.platform.unlock().await {
            tracing::warn!("Platform unlock failed: {}", e);
        }
    }
}
