use capsule_core::request::GuardianTarget;
use capsule_core::{Request, Response};

use crate::app::AppContext;
use crate::cli::{ChallengeArgs, VerifyArgs};
use crate::errors::CliError;
use crate::helpers::parse_capsule_index;
use crate::output;

pub fn handle_challenge(ctx: &AppContext, args: &ChallengeArgs) -> anyhow::Result<()> {
    let guardian_for = match (&args.guardian_for, &args.capsule) {
        (Some(owner), Some(capsule)) => Some(GuardianTarget {
            owner: owner.clone(),
            capsule: parse_capsule_index(capsule)?.index(),
        }),
        _ => None,
    };
    let request = Request::IssueChallenge {
        address: args.address.clone(),
        guardian_for,
    };

    let ui = ctx.ui_context(args.json, None);
    let vault = ctx.open_vault()?;
    let result = vault
        .service()
        .handle(None, request)
        .map_err(|e| anyhow::Error::from(CliError::from(e)));
    let response = vault.finish(result)?;
    output::render(&ui, ctx.quiet(), &response)
}

/// Check a signed challenge. The challenge is spent either way.
pub fn handle_verify(ctx: &AppContext, args: &VerifyArgs) -> anyhow::Result<()> {
    let ui = ctx.ui_context(args.json, None);
    let vault = ctx.open_vault()?;
    let result = vault
        .login(&args.proof)
        .map(|identity| Response::Verified {
            session: *identity.token(),
            address: identity.address().clone(),
            expires_at: identity.expires_at(),
        })
        .map_err(anyhow::Error::from);
    let response = vault.finish(result)?;
    output::render(&ui, ctx.quiet(), &response)
}
