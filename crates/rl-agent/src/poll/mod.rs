//! Poll transport: fetch the full lock state on a fixed cadence

mod client;
mod shadow;

pub use client::{apply_snapshot, FailureAlarm, PollClient};
pub use shadow::{PollShadow, Transition};
