use capsule_core::Request;

use crate::app::AppContext;
use crate::cli::GuardianCommands;
use crate::helpers::{parse_attestation, parse_capsule_index};

use super::run_signed;

pub fn handle_guardian(ctx: &AppContext, command: &GuardianCommands) -> anyhow::Result<()> {
    match command {
        GuardianCommands::Add(args) => run_signed(
            ctx,
            &args.proof,
            args.json,
            None,
            Request::AddGuardian {
                guardian: args.guardian.clone(),
            },
        ),
        GuardianCommands::Remove(args) => run_signed(
            ctx,
            &args.proof,
            args.json,
            None,
            Request::RemoveGuardian {
                guardian: args.guardian.clone(),
            },
        ),
        GuardianCommands::List(args) => {
            run_signed(ctx, &args.proof, args.json, None, Request::ListGuardians)
        }
        GuardianCommands::Status(args) => run_signed(
            ctx,
            &args.proof,
            args.json,
            None,
            Request::QuorumStatus {
                owner: args.owner.clone(),
            },
        ),
        GuardianCommands::Unlock(args) => {
            let capsule = parse_capsule_index(&args.index)?.index();
            let attestations = args
                .attestations
                .iter()
                .map(|raw| parse_attestation(raw))
                .collect::<Result<Vec<_>, _>>()?;
            run_signed(
                ctx,
                &args.proof,
                args.json,
                None,
                Request::GuardianUnlock {
                    owner: args.owner.clone(),
                    capsule,
                    attestations,
                },
            )
        }
    }
}
