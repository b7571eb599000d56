use clap::CommandFactory;
use clap_complete::generate;

use capsule_core::{Response, StorageEngine, VERSION};

use crate::app::{open_storage_with_retry, AppContext};
use crate::cli::Cli;
use crate::errors::CliError;
use crate::output;

pub fn handle_check(ctx: &AppContext) -> anyhow::Result<()> {
    let (storage, _passphrase) =
        open_storage_with_retry(&ctx.vault_path()?, ctx.cli().no_input)?;
    match storage.check_integrity() {
        Ok(()) => {
            if !ctx.quiet() {
                println!("Integrity check: OK");
                println!("- sqlite integrity: OK");
                println!("- capsule indices: OK");
                println!("- unlock times: OK");
                println!("- guardians: OK");
                println!("- metadata keys: OK");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Integrity check: FAILED");
            eprintln!("- error: {}", err);
            eprintln!("Hint: Restore the vault from a backup copy.");
            Err(CliError::integrity_failed("Integrity check failed").into())
        }
    }
}

pub fn handle_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "capsule", &mut std::io::stdout());
    Ok(())
}

pub fn handle_version(ctx: &AppContext) -> anyhow::Result<()> {
    let ui = ctx.ui_context(false, None);
    output::render(
        &ui,
        false,
        &Response::Version {
            version: VERSION.to_string(),
        },
    )
}
