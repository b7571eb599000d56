//! Line-oriented JSON request loop.
//!
//! Reads one [`Request`] per line on stdin and writes one [`Response`] per
//! line on stdout. The process holds at most one session: a successful
//! `verify_ownership` replaces it and `end_session` clears it.

use std::io::{self, BufRead, Write};

use capsule_core::identity::SessionToken;
use capsule_core::{CapsuleService, Request, Response, StorageEngine};
use tracing::debug;

use crate::app::AppContext;
use crate::output::response_line;

pub fn handle_exec(ctx: &AppContext) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let result = serve(vault.service(), io::stdin().lock(), io::stdout().lock());
    vault.finish(result)
}

fn serve<S: StorageEngine>(
    service: &CapsuleService<S>,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    let mut session: Option<SessionToken> = None;
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        if input.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        let response = match std::str::from_utf8(&buffer) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<Request>(line) {
                Ok(request) => dispatch(service, &mut session, request),
                Err(e) => malformed(e),
            },
            Err(e) => malformed(e),
        };
        writeln!(output, "{}", response_line(&response)?)?;
        output.flush()?;
    }
    Ok(())
}

fn malformed(err: impl std::fmt::Display) -> Response {
    Response::Error {
        kind: "input".to_string(),
        message: format!("Malformed request: {}", err),
        retryable: false,
    }
}

fn dispatch<S: StorageEngine>(
    service: &CapsuleService<S>,
    session: &mut Option<SessionToken>,
    request: Request,
) -> Response {
    match service.handle(session.as_ref(), request) {
        Ok(response) => {
            match &response {
                Response::Verified {
                    session: token,
                    address,
                    ..
                } => {
                    debug!(address = %address, "exec session opened");
                    *session = Some(*token);
                }
                Response::SessionEnded { .. } => *session = None,
                _ => {}
            }
            response
        }
        Err(err) => {
            debug!(error = %err, "request failed");
            Response::from_error(&err)
        }
    }
}
