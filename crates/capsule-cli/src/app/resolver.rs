//! Path resolution for config and vault files.

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{default_config_path, CapsuleConfig};
use crate::errors::CliError;

/// Resolve the config file path, checking CAPSULE_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("CAPSULE_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Resolve the vault file path from CLI args or config.
pub fn resolve_vault_path(
    cli: &Cli,
    config: Option<&CapsuleConfig>,
    config_path: &Path,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.vault.as_ref() {
        return Ok(PathBuf::from(path));
    }
    match config {
        Some(config) => Ok(PathBuf::from(&config.vault.path)),
        None => Err(CliError::not_found(
            missing_config_message(config_path),
            "Hint: Run `capsule init` first.",
        )
        .into()),
    }
}

/// Error message when vault file is missing.
pub fn missing_vault_message(path: &Path) -> String {
    format!(
        "No vault found at {}\n\nRun:\n  capsule init\n\nOr specify a vault path:\n  CAPSULE_VAULT=/path/to/my.capsule capsule init",
        path.display()
    )
}

/// Error message when config file is missing.
pub fn missing_config_message(config_path: &Path) -> String {
    format!(
        "No config found at {}\n\nRun:\n  capsule init\n\nOr specify a vault path:\n  CAPSULE_VAULT=/path/to/my.capsule capsule init",
        config_path.display()
    )
}
