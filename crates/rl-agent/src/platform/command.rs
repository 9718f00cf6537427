//! Platform action backed by OS commands

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use rl_core::error::PlatformActionError;

use super::PlatformAction;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl OsCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs the host's lock/unlock commands
#[derive(Debug, Clone)]
pub struct CommandAction {
    name: String,
    os: &'static str,
    lock: Option<OsCommand>,
    unlock: Option<OsCommand>,
    timeout: Duration,
}

impl CommandAction {
    /// Explicit commands; `None` means the action is unsupported
    pub fn new(
        os: &'static str,
        lock: Option<OsCommand>,
        unlock: Option<OsCommand>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: format!("command ({})", os),
            os,
            lock,
            unlock,
            timeout,
        }
    }

    /// The commands for the operating system this binary was built for
    pub fn for_current_os(timeout: Duration) -> Self {
        let os = std::env::consts::OS;
        let (lock, unlock) = match os {
            "linux" => (
                Some(OsCommand::new("loginctl", &["lock-session"])),
                Some(OsCommand::new("loginctl", &["unlock-sessions"])),
            ),
            "macos" => (
                Some(OsCommand::new("pmset", &["displaysleepnow"])),
                Some(OsCommand::new("killall", &["ScreenSaverEngine"])),
            ),
            "windows" => (
                Some(OsCommand::new("rundll32.exe", &["user32.dll,LockWorkStation"])),
                None,
            ),
            _ => (None, None),
        };
        Self::new(os, lock, unlock, timeout)
    }

    async fn run(
        &self,
        action: &'static str,
        command: Option<&OsCommand>,
    ) -> Result<(), PlatformActionError> {
        let command = command.ok_or(PlatformActionError::Unsupported {
            action,
            os: self.os,
        })?;
        let shown = command.display();
        tracing::debug!("Running `{}`", shown);

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| PlatformActionError::Timeout(shown.clone()))?
            .map_err(|e| PlatformActionError::Command {
                command: shown.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformActionError::Command {
                command: shown,
                reason: format!("{} {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl PlatformAction for CommandAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lock(&self) -> Result<(), PlatformActionError> {
        self.run("lock", self.lock.as_ref()).await
    }

    async fn unlock(&self) -> Result<(), PlatformActionError> {
        self.run("unlock", self.unlock.as_ref()).await
    }
}
