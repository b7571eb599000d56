//! Passphrase prompts and message input.

use std::io::{self, IsTerminal, Read};

use dialoguer::Password;
use zeroize::Zeroizing;

/// Read CAPSULE_PASSPHRASE, ignoring blank values.
fn env_passphrase() -> Option<Zeroizing<String>> {
    std::env::var("CAPSULE_PASSPHRASE")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(Zeroizing::new)
}

/// Prompt for passphrase, or read from CAPSULE_PASSPHRASE env var.
pub fn prompt_passphrase(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_passphrase() {
        return Ok(value);
    }
    if !interactive {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set CAPSULE_PASSPHRASE."
        ));
    }
    Password::new()
        .with_prompt("Vault passphrase")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

/// Prompt for passphrase with confirmation (for init), or read from CAPSULE_PASSPHRASE env var.
pub fn prompt_init_passphrase(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = env_passphrase() {
        return Ok(value);
    }
    if !interactive {
        return Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set CAPSULE_PASSPHRASE."
        ));
    }
    Password::new()
        .with_prompt("Enter vault passphrase")
        .with_confirmation("Confirm passphrase", "Passphrases do not match")
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

/// Capsule message from `--message`, or all of stdin when it is piped.
pub fn read_message(message: Option<String>) -> anyhow::Result<String> {
    if let Some(message) = message {
        return Ok(message);
    }
    if io::stdin().is_terminal() {
        return Err(anyhow::anyhow!(
            "No message provided. Use --message or pipe the message on stdin."
        ));
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
