//! Test harness commands, compiled only with the `test-support` feature.

use capsule_core::Response;

use crate::app::AppContext;
use crate::cli::UnlockArgs;
use crate::errors::CliError;
use crate::helpers::parse_capsule_index;
use crate::output;

/// Unlock regardless of time or quorum. The vault config must set
/// `test_mode = true`.
pub fn handle_force_unlock(ctx: &AppContext, args: &UnlockArgs) -> anyhow::Result<()> {
    let id = parse_capsule_index(&args.index)?;
    let ui = ctx.ui_context(args.json, None);
    let vault = ctx.open_vault()?;
    let result = vault.login(&args.proof).and_then(|identity| {
        let plaintext = vault
            .service()
            .test_mode()?
            .force_unlock(identity.token(), id)?;
        Ok(Response::Unlocked {
            capsule: id,
            message: String::from_utf8_lossy(&plaintext).into_owned(),
        })
    });
    let response = vault.finish(result.map_err(anyhow::Error::from))?;
    output::render(&ui, ctx.quiet(), &response)
}
