use std::io::IsTerminal;
use std::path::PathBuf;

use capsule_core::AgeSqliteStorage;

use crate::app::{resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_vault_path, read_config, write_config, CapsuleConfig};
use crate::errors::CliError;
use crate::helpers::prompt_init_passphrase;
use crate::ui::{hint, print, receipt};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let config_path = match args.config_path.as_ref() {
        Some(path) => PathBuf::from(path),
        None => resolve_config_path()?,
    };
    let existing = if config_path.exists() {
        Some(read_config(&config_path)?)
    } else {
        None
    };

    let vault_path = match (args.path.as_ref(), ctx.cli().vault.as_ref(), existing.as_ref()) {
        (Some(path), _, _) | (None, Some(path), _) => PathBuf::from(path),
        (None, None, Some(config)) => PathBuf::from(&config.vault.path),
        (None, None, None) => default_vault_path()?,
    };
    if vault_path.exists() {
        return Err(CliError::invalid_input(format!(
            "A vault already exists at {}",
            vault_path.display()
        ))
        .into());
    }

    let kdf = existing.as_ref().map(|config| config.kdf).unwrap_or_default();
    let interactive = std::io::stdin().is_terminal() && !ctx.cli().no_input;
    let passphrase = prompt_init_passphrase(interactive)?;

    if let Some(parent) = vault_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create vault directory {}: {}", parent.display(), e)
            })?;
        }
    }
    let vault_id =
        AgeSqliteStorage::create(&vault_path, &passphrase, &kdf).map_err(CliError::from)?;

    let wrote_config = existing.is_none();
    if wrote_config {
        write_config(&config_path, &CapsuleConfig::new(vault_path.clone()))?;
    }

    if !ctx.quiet() {
        let ui = ctx.ui_context(false, None);
        let vault_display = vault_path.display().to_string();
        let config_display = config_path.display().to_string();
        let id = vault_id.to_string();
        print(
            &ui,
            &receipt(
                &ui,
                "Vault created",
                &[
                    ("Vault", vault_display.as_str()),
                    ("Config", config_display.as_str()),
                    ("Vault ID", id.as_str()),
                ],
            ),
        );
        if !wrote_config {
            print(&ui, &hint(&ui, "Existing config left unchanged."));
        }
        print(&ui, &hint(&ui, "capsule challenge <your-address>"));
    }
    Ok(())
}
