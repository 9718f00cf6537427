//! Device authentication for the server
//!
//! The server keeps the registered device secrets in a [`DeviceRegistry`]
//! and hands it to [`rl_core::auth::verify`] for every `AUTH` message and
//! every signed status fetch.

mod devices;

pub use devices::DeviceRegistry;
