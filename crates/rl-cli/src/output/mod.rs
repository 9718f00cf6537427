//! Output formatting utilities for the CLI
//!
//! Lock state and device tables for the terminal, plus colored status
//! messages.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use rl_core::time::elapsed_millis;
use rl_protocol::{DeviceInfo, LockState};

/// Format the lock state as a human-readable block
pub fn format_state(state: &LockState) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Lock: {}\n",
        if state.locked { "LOCKED" } else { "unlocked" }
    ));
    output.push_str(&format!(
        "Changed: {}\n",
        state
            .triggered_at
            .map(format_age)
            .unwrap_or_else(|| "never".to_string())
    ));
    if let Some(by) = &state.triggered_by {
        output.push_str(&format!("By: {}\n", by));
    }
    output.push_str("Message:\n");
    for line in state.message.lines() {
        output.push_str(&format!("  {}\n", line));
    }

    output
}

/// Format open device channels as an ASCII table
pub fn format_devices(devices: &[DeviceInfo]) -> String {
    if devices.is_empty() {
        return "No devices connected".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "DEVICE")]
        device: String,
        #[tabled(rename = "PEER")]
        peer: String,
        #[tabled(rename = "CONNECTED")]
        connected: String,
        #[tabled(rename = "LAST SEEN")]
        last_seen: String,
        #[tabled(rename = "CHANNEL")]
        channel: String,
    }

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            device: d
                .device_id
                .clone()
                .unwrap_or_else(|| "(authenticating)".to_string()),
            peer: d.peer.clone(),
            connected: format_age(d.connected_at),
            last_seen: format_age(d.last_seen),
            channel: truncate(&d.session_id, 8),
        })
        .collect();

    Table::new(rows)
        .with(Style::rounded())
        .with(Width::wrap(100))
        .to_string()
}

/// "5m 2s ago" for a millisecond timestamp
fn format_age(at_ms: u64) -> String {
    let secs = elapsed_millis(at_ms) / 1000;
    format!("{} ago", format_duration(secs))
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    match secs {
        0..=59 => format!("{}s", secs),
        60..=3599 => format!("{}m {}s", secs / 60, secs % 60),
        3600..=86399 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d {}h", secs / 86400, (secs % 86400) / 3600),
    }
}

/// Truncate to at most `max_len` characters
fn truncate(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    print_styled(std::io::stdout(), crossterm::style::Color::Green, "✓ ", msg);
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    print_styled(std::io::stderr(), crossterm::style::Color::Red, "✗ ", msg);
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    print_styled(std::io::stderr(), crossterm::style::Color::Yellow, "⚠ ", msg);
}

fn print_styled(mut out: impl std::io::Write, color: crossterm::style::Color, prefix: &str, msg: &str) {
    use crossterm::style::{Print, ResetColor, SetForegroundColor};

    let _ = crossterm::execute!(
        out,
        SetForegroundColor(color),
        Print(prefix),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
