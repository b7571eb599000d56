//! Capsule CLI - time-locked encrypted messages unlocked by Bitcoin key holders
//!
//! This is the command-line interface for Capsule. It provides a front end
//! over the core library: vault setup, ownership challenges, capsules,
//! guardians, and a JSON request loop for scripts.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod logging;
mod output;
mod ui;

use clap::{CommandFactory, Parser};

use capsule_core::CapsuleError;

use crate::app::AppContext;
#[cfg(feature = "test-support")]
use crate::cli::DebugCommands;
use crate::cli::{Cli, Commands};
use crate::errors::CliError;
use crate::logging::LogSettings;

fn main() {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);

    let logging_section = ctx.config().ok().flatten().map(|config| &config.logging);
    if let Err(e) = logging::init(&LogSettings::resolve(&cli, logging_section)) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(&ctx, &cli) {
        exit_with(e);
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => commands::handle_init(ctx, args),
        Some(Commands::Challenge(args)) => commands::handle_challenge(ctx, args),
        Some(Commands::Verify(args)) => commands::handle_verify(ctx, args),
        Some(Commands::Create(args)) => commands::handle_create(ctx, args),
        Some(Commands::List(args)) => commands::handle_list(ctx, args),
        Some(Commands::Unlock(args)) => commands::handle_unlock(ctx, args),
        Some(Commands::Guardian(command)) => commands::handle_guardian(ctx, command),
        Some(Commands::Exec) => commands::handle_exec(ctx),
        Some(Commands::Check) => commands::handle_check(ctx),
        Some(Commands::Completions(args)) => commands::handle_completions(args.shell),
        Some(Commands::Version) => commands::handle_version(ctx),
        #[cfg(feature = "test-support")]
        Some(Commands::Debug(DebugCommands::ForceUnlock(args))) => {
            commands::handle_force_unlock(ctx, args)
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Print the error and exit with the code its class maps to.
fn exit_with(err: anyhow::Error) -> ! {
    let err = match err.downcast::<CliError>() {
        Ok(cli_err) => cli_err.exit(),
        Err(other) => other,
    };
    match err.downcast::<CapsuleError>() {
        Ok(core_err) => CliError::from(core_err).exit(),
        Err(other) => {
            eprintln!("Error: {:#}", other);
            std::process::exit(1)
        }
    }
}
