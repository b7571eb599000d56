use capsule_core::Request;

use crate::app::AppContext;
use crate::cli::{CreateArgs, ListArgs, UnlockArgs};
use crate::errors::CliError;
use crate::helpers::{parse_capsule_index, read_message};

use super::run_signed;

pub fn handle_create(ctx: &AppContext, args: &CreateArgs) -> anyhow::Result<()> {
    let message = read_message(args.message.clone())?;
    let request = Request::CreateCapsule {
        message,
        unlock_delay: args.delay.clone(),
    };
    run_signed(ctx, &args.proof, args.json, None, request)
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    if let Some(format) = args.format.as_deref() {
        if format != "table" && format != "plain" {
            return Err(CliError::invalid_input(format!(
                "Unsupported format: {} (use table or plain)",
                format
            ))
            .into());
        }
    }
    run_signed(
        ctx,
        &args.proof,
        args.json,
        args.format.as_deref(),
        Request::ListCapsules,
    )
}

pub fn handle_unlock(ctx: &AppContext, args: &UnlockArgs) -> anyhow::Result<()> {
    let capsule = parse_capsule_index(&args.index)?.index();
    run_signed(
        ctx,
        &args.proof,
        args.json,
        None,
        Request::UnlockCapsule { capsule },
    )
}
