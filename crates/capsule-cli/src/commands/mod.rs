//! Command handlers.
//!
//! Owner commands open the vault, verify the signed challenge passed with
//! `--address/--challenge/--signature`, run one request, save the vault and
//! render the response.

mod capsules;
#[cfg(feature = "test-support")]
mod debug;
mod exec;
mod guardians;
mod identity;
mod init;
mod maintenance;

pub use capsules::{handle_create, handle_list, handle_unlock};
#[cfg(feature = "test-support")]
pub use debug::handle_force_unlock;
pub use exec::handle_exec;
pub use guardians::handle_guardian;
pub use identity::{handle_challenge, handle_verify};
pub use init::handle_init;
pub use maintenance::{handle_check, handle_completions, handle_version};

use capsule_core::{Request, Response};

use crate::app::AppContext;
use crate::cli::OwnerProof;
use crate::errors::CliError;
use crate::output;

/// Sign in with `proof`, run `request`, save the vault, render the result.
fn run_signed(
    ctx: &AppContext,
    proof: &OwnerProof,
    json: bool,
    format: Option<&str>,
    request: Request,
) -> anyhow::Result<()> {
    let ui = ctx.ui_context(json, format);
    let vault = ctx.open_vault()?;
    let result = vault.login(proof).and_then(|identity| {
        vault
            .service()
            .handle(Some(identity.token()), request)
            .map_err(CliError::from)
    });
    let response: Response = vault.finish(result.map_err(anyhow::Error::from))?;
    output::render(&ui, ctx.quiet(), &response)
}
