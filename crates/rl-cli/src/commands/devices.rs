//! Devices command implementation

use anyhow::Result;

use crate::client::LockClient;
use crate::output::{format_devices, print_error};

/// Execute the devices command
pub async fn devices_command(client: &LockClient, all: bool) -> Result<()> {
    let devices = match client.devices().await {
        Ok(d) => d,
        Err(e) => {
            print_error(&format!("Failed to list devices: {:#}", e));
            return Err(e);
        }
    };

    // Hide channels that never finished the handshake unless asked
    let devices: Vec<_> = if all {
        devices
    } else {
        devices
            .into_iter()
            .filter(|d| d.device_id.is_some())
            .collect()
    };

    println!("{}", format_devices(&devices));
    Ok(())
}
