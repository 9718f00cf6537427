//! rl-core: Core types, device authentication and configuration for remote-lock
//!
//! This crate provides the auth verifier, the error taxonomy, configuration
//! structures and small shared helpers used by the server, agent and CLI.

pub mod auth;
pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use auth::{AuthAssertion, DeviceCredential, SecretLookup};
pub use error::{AuthError, ForbiddenError, RlError};
pub use types::DeviceId;
