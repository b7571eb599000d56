//! Passphrase handling and storage opening with retry logic.

use std::io::IsTerminal;
use std::path::Path;

use capsule_core::{AgeSqliteStorage, CapsuleError};
use zeroize::Zeroizing;

use crate::constants::MAX_PASSPHRASE_ATTEMPTS;
use crate::errors::CliError;
use crate::helpers::prompt_passphrase;

use super::resolver::missing_vault_message;

/// Open the vault, prompting again after a wrong passphrase when a TTY is
/// attached.
///
/// A passphrase from CAPSULE_PASSPHRASE gets exactly one attempt.
pub fn open_storage_with_retry(
    path: &Path,
    no_input: bool,
) -> anyhow::Result<(AgeSqliteStorage, Zeroizing<String>)> {
    if !path.exists() {
        return Err(CliError::not_found(
            missing_vault_message(path),
            "Hint: Check --vault or the [vault] path in your config.",
        )
        .into());
    }

    let from_env = std::env::var("CAPSULE_PASSPHRASE")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let interactive = std::io::stdin().is_terminal() && !no_input;
    let max_attempts = if interactive && !from_env {
        MAX_PASSPHRASE_ATTEMPTS
    } else {
        1
    };
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let passphrase = prompt_passphrase(interactive)?;
        match AgeSqliteStorage::open(path, &passphrase) {
            Ok(storage) => return Ok((storage, passphrase)),
            Err(CapsuleError::IncorrectPassphrase) => {
                let remaining = max_attempts.saturating_sub(attempts);
                if remaining == 0 {
                    if max_attempts == 1 {
                        return Err(CliError::auth_failed("Incorrect passphrase.").into());
                    }
                    return Err(CliError::auth_failed_with_hint(
                        "Too many failed passphrase attempts.",
                        "Hint: If you forgot your passphrase, the vault cannot be recovered.",
                    )
                    .into());
                }
                eprintln!(
                    "Incorrect passphrase. {} attempt{} remaining.",
                    remaining,
                    if remaining == 1 { "" } else { "s" }
                );
            }
            Err(CapsuleError::VaultNotFound) => {
                return Err(CliError::not_found(
                    missing_vault_message(path),
                    "Hint: Check --vault or the [vault] path in your config.",
                )
                .into());
            }
            Err(err) => return Err(CliError::from(err).into()),
        }
    }
}
