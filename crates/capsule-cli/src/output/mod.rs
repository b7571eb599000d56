//! Output formatting for service responses.
//!
//! Every command produces a core [`Response`]; this module renders it as
//! JSON, plain `key=value` text, or tables.

mod json;
mod text;

use capsule_core::Response;

use crate::ui::UiContext;

pub use json::response_line;

/// Render a response in the context's output mode.
///
/// Quiet mode suppresses everything except unlocked plaintext and JSON.
pub fn render(ctx: &UiContext, quiet: bool, response: &Response) -> anyhow::Result<()> {
    if ctx.mode.is_json() {
        println!("{}", response_line(response)?);
        return Ok(());
    }
    if quiet {
        if let Response::Unlocked { message, .. } = response {
            println!("{}", message);
        }
        return Ok(());
    }
    text::render(ctx, response);
    Ok(())
}
