//! rl-agent: Device agent for remote-lock
//!
//! The agent follows the server's lock state over a persistent device
//! channel (push) or periodic status fetches (poll), raises or lowers the
//! lock surface and locks the host through the platform action.

pub mod agent;
pub mod dispatch;
pub mod platform;
pub mod poll;
pub mod push;
pub mod ui;

pub use agent::run_agent;
pub use dispatch::Dispatcher;
pub use push::ConnectionError;
pub use ui::{LockSurface, UiCommand, UiHandle, UiPump};
