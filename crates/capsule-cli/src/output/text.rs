//! Text and table output formatting.

use capsule_core::identity::IdentityStatus;
use capsule_core::{CapsuleStatus, CapsuleSummary, Response};
use chrono::{DateTime, Utc};

use crate::ui::{badge, hint, kv, print, receipt, simple_table, Badge, Column, UiContext};

fn timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn render(ctx: &UiContext, response: &Response) {
    match response {
        Response::Challenge {
            challenge_id,
            message,
            expires_at,
        } => {
            let id = challenge_id.to_string();
            let expires = timestamp(expires_at);
            print(
                ctx,
                &receipt(
                    ctx,
                    "Challenge issued",
                    &[("Challenge", id.as_str()), ("Expires", expires.as_str())],
                ),
            );
            print(ctx, "");
            print(ctx, message);
            print(ctx, "");
            print(
                ctx,
                &hint(ctx, "Sign the message above with the address's key."),
            );
        }
        Response::Verified {
            address, expires_at, ..
        } => {
            let address = address.to_string();
            let expires = timestamp(expires_at);
            print(
                ctx,
                &receipt(
                    ctx,
                    "Ownership verified",
                    &[("Address", address.as_str()), ("Session expires", expires.as_str())],
                ),
            );
        }
        Response::SessionEnded { ended } => {
            print(ctx, &kv(ctx, "Session ended", &ended.to_string()));
        }
        Response::Identity { identity } => match identity {
            IdentityStatus::Unverified => print(ctx, &kv(ctx, "Identity", "unverified")),
            IdentityStatus::Verified {
                address,
                expires_at,
            } => {
                print(ctx, &kv(ctx, "Identity", address.as_str()));
                print(ctx, &kv(ctx, "Expires", &timestamp(expires_at)));
            }
        },
        Response::Created(created) => {
            let index = created.index.to_string();
            let unlock_time = timestamp(&created.unlock_time);
            print(
                ctx,
                &receipt(
                    ctx,
                    &created.confirmation,
                    &[("Index", index.as_str()), ("Unlock time", unlock_time.as_str())],
                ),
            );
        }
        Response::Capsules { capsules } => print_capsules(ctx, capsules),
        Response::Unlocked { capsule, message } => {
            if ctx.mode.is_pretty() {
                print(
                    ctx,
                    &badge(ctx, Badge::Ok, &format!("Capsule {} unlocked", capsule)),
                );
                print(ctx, "");
            }
            println!("{}", message);
        }
        Response::Ack(ack) => print(ctx, &badge(ctx, Badge::Ok, &ack.message)),
        Response::Guardians { guardians } => {
            if guardians.is_empty() {
                print(ctx, "No guardians configured.");
                print(ctx, &hint(ctx, "capsule guardian add <address>"));
            }
            for guardian in guardians {
                print(ctx, guardian.as_str());
            }
        }
        Response::Quorum(status) => {
            print(ctx, &kv(ctx, "Guardians", &status.registered.to_string()));
            print(ctx, &kv(ctx, "Required", &status.required.to_string()));
        }
        Response::Version { version } => print(ctx, &format!("capsule {}", version)),
        Response::Error { message, .. } => {
            eprintln!("{}", badge(ctx, Badge::Err, message));
        }
    }
}

fn print_capsules(ctx: &UiContext, capsules: &[CapsuleSummary]) {
    if capsules.is_empty() {
        print(ctx, "No capsules yet.");
        print(ctx, &hint(ctx, "capsule create --delay 7d --message \"...\""));
        return;
    }
    let columns = [
        Column::new("Index"),
        Column::new("Status"),
        Column::new("Created"),
        Column::new("Delay"),
        Column::new("Unlocks"),
    ];
    let rows: Vec<Vec<String>> = capsules
        .iter()
        .map(|capsule| {
            let status = match capsule.status {
                CapsuleStatus::Locked if ctx.mode.is_pretty() => badge(ctx, Badge::Locked, ""),
                CapsuleStatus::Unlocked if ctx.mode.is_pretty() => badge(ctx, Badge::Ok, ""),
                other => other.as_str().to_string(),
            };
            vec![
                capsule.index.to_string(),
                status,
                timestamp(&capsule.created_at),
                capsule.unlock_delay.to_string(),
                timestamp(&capsule.unlock_time),
            ]
        })
        .collect();
    print(ctx, &simple_table(ctx, &columns, &rows));
}
