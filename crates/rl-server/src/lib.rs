//! rl-server: Rendezvous server for remote-lock
//!
//! The server owns the lock state. Admins change it through an HTTP control
//! surface guarded by a static secret; device agents follow it either over
//! a persistent WebSocket channel, where every change is pushed as it
//! happens, or by polling a signed status endpoint.

pub mod auth;
pub mod connection;
pub mod coordinator;
pub mod push;
pub mod server;
pub mod state;

pub use coordinator::{LockCoordinator, MutationError};
pub use state::ServerState;
