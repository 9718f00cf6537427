//! Configuration management for remote-lock

mod agent;
mod server;
pub mod serde_utils;

pub use agent::{AgentConfig, BackoffConfig};
pub use server::ServerConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remote-lock")
}

/// Default path of the server configuration file
pub fn default_server_config_path() -> PathBuf {
    default_config_dir().join("server.toml")
}

/// Default path of the agent configuration file
pub fn default_agent_config_path() -> PathBuf {
    default_config_dir().join("agent.toml")
}

/// Load a TOML config file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    Ok(toml::from_str(&content)?)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Save configuration that holds a secret.
///
/// Same as [`save_config`], then restricts the file to mode 0600 on Unix.
pub fn save_config_private<T: serde::Serialize>(
    path: &Path,
    config: &T,
) -> Result<(), ConfigError> {
    save_config(path, config)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| ConfigError::Invalid(format!("Failed to set permissions: {}", e)))?;
    }

    Ok(())
}
