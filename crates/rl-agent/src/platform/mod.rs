//! Host lock/unlock capability
//!
//! The agent picks one [`PlatformAction`] at startup: [`CommandAction`]
//! runs the operating system's own lock command, [`LogOnlyAction`] only logs
//! (dry run). Every call is bounded by a timeout and never retried; a
//! failure is reported for that one command and the session carries on.

mod command;

pub use command::{CommandAction, OsCommand};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use rl_core::error::PlatformActionError;

/// Default upper bound for a single platform command
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Locks and unlocks the host
#[async_trait]
pub trait PlatformAction: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Lock the host session
    async fn lock(&self) -> Result<(), PlatformActionError>;

    /// Unlock the host session
    async fn unlock(&self) -> Result<(), PlatformActionError>;
}

/// Dry-run action that only logs
#[derive(Debug, Default)]
pub struct LogOnlyAction;

#[async_trait]
impl PlatformAction for LogOnlyAction {
    fn name(&self) -> &str {
        "log-only"
    }

    async fn lock(&self) -> Result<(), PlatformActionError> {
        tracing::info!("[dry run] would lock the host session");
        Ok(())
    }

    async fn unlock(&self) -> Result<(), PlatformActionError> {
        tracing::info!("[dry run] would unlock the host session");
        Ok(())
    }
}

/// Choose the platform action for this process
pub fn select_platform_action(dry_run: bool, timeout: Duration) -> Arc<dyn PlatformAction> {
    let action: Arc<dyn PlatformAction> = if dry_run {
        Arc::new(LogOnlyAction)
    } else {
        Arc::new(CommandAction::for_current_os(timeout))
    };
    tracing::info!("Platform action: {}", action.name());
    action
}
