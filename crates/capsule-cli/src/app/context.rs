//! Application context for the Capsule CLI.
//!
//! Provides a unified context that combines CLI arguments with the
//! lazily-loaded config file.

use std::path::PathBuf;

use once_cell::unsync::OnceCell;

use capsule_core::VaultConfig;

use crate::cli::Cli;
use crate::config::{read_config, CapsuleConfig};
use crate::ui::UiContext;

use super::resolver::{resolve_config_path, resolve_vault_path};
use super::vault::Vault;

/// Application context that bundles CLI args with configuration.
///
/// This avoids repeatedly loading config and threading multiple parameters
/// through handler functions.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<CapsuleConfig>>,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    /// Get the CLI arguments.
    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// The config file, if one exists.
    pub fn config(&self) -> anyhow::Result<Option<&CapsuleConfig>> {
        let config = self.config.get_or_try_init(|| {
            let path = resolve_config_path()?;
            if path.exists() {
                read_config(&path).map(Some)
            } else {
                Ok(None)
            }
        })?;
        Ok(config.as_ref())
    }

    /// Vault policy from `[policy]`, or the defaults without a config file.
    pub fn policy(&self) -> anyhow::Result<VaultConfig> {
        Ok(self
            .config()?
            .map(|config| config.policy.clone())
            .unwrap_or_default())
    }

    /// Resolve the vault file path.
    pub fn vault_path(&self) -> anyhow::Result<PathBuf> {
        let config_path = resolve_config_path()?;
        resolve_vault_path(self.cli, self.config()?, &config_path)
    }

    /// Open the vault with passphrase handling and retry logic.
    pub fn open_vault(&self) -> anyhow::Result<Vault> {
        Vault::open(&self.vault_path()?, self.policy()?, self.cli.no_input)
    }

    /// Build a UI context for rendering output.
    pub fn ui_context(&self, json: bool, format: Option<&str>) -> UiContext {
        UiContext::from_env(json, format)
    }
}
