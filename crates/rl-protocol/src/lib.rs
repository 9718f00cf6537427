//! rl-protocol: Wire types for remote-lock
//!
//! This crate defines the tagged JSON messages exchanged between device
//! agents and the server over the persistent device channel, plus the
//! request/response bodies of the HTTP control surface.

pub mod api;
pub mod codec;
pub mod error;
pub mod message;
pub mod state;

pub use api::{ApiError, ApiResponse, DeviceInfo, DevicesResponse, MessageRequest};
pub use codec::{check_lock_message, decode, encode, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use message::{close_code, ChannelMessage, MessageType};
pub use state::LockState;
