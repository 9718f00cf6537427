//! Status command implementation

use anyhow::Result;

use crate::client::LockClient;
use crate::output::{format_state, print_error};

/// Execute the status command
pub async fn status_command(client: &LockClient, json: bool) -> Result<()> {
    let state = match client.status().await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to get lock status: {:#}", e));
            return Err(e);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("{}", format_state(&state));
    }

    Ok(())
}
