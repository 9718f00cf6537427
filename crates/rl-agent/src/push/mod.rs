//! Push transport: a persistent, authenticated device channel

mod connector;
pub mod reconnect;
pub mod session;

pub use connector::{ConnectionError, PushConnector};
pub use reconnect::{ExponentialBackoff, ReconnectScheduler};
pub use session::{CloseReason, PushSession, SessionEvent, SessionState};
