//! CLI command implementations

mod devices;
mod lock;
mod status;

pub use devices::devices_command;
pub use lock::{lock_command, message_command, unlock_command};
pub use status::status_command;
