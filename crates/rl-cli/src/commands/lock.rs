//! Lock, unlock and message commands

use anyhow::Result;

use crate::client::LockClient;
use crate::output::{format_state, print_error, print_success};

/// Execute the lock command
pub async fn lock_command(client: &LockClient, message: Option<String>) -> Result<()> {
    let state = match client.lock(message).await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to lock: {:#}", e));
            return Err(e);
        }
    };

    print_success("Locked");
    println!("{}", format_state(&state));
    Ok(())
}

/// Execute the unlock command
pub async fn unlock_command(client: &LockClient) -> Result<()> {
    let state = match client.unlock().await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to unlock: {:#}", e));
            return Err(e);
        }
    };

    print_success("Unlocked");
    println!("{}", format_state(&state));
    Ok(())
}

/// Execute the message command
pub async fn message_command(client: &LockClient, message: &str) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("Lock message must not be empty");
    }

    let state = match client.set_message(message).await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to update message: {:#}", e));
            return Err(e);
        }
    };

    print_success("Lock message updated");
    println!("{}", format_state(&state));
    Ok(())
}
