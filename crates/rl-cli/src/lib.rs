//! rl-cli: Command-line interface for remote-lock
//!
//! Provides the `rlctl` admin client for the server's HTTP control surface.

pub mod client;
pub mod commands;
pub mod output;
