//! Device channel bookkeeping

mod health;
mod pool;

pub use health::{Expiry, Liveness};
pub use pool::{DeviceSession, SessionPool};
