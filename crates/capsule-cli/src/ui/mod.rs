//! UI primitives for the Capsule CLI.
//!
//! - **Context**: Environment detection (TTY, color) and output mode
//! - **Theme**: Badges and styling
//! - **Render**: Tables, key-value lines, receipts, hints

mod context;
pub mod render;
pub mod theme;

pub use context::{OutputMode, UiContext};
pub use theme::Badge;

pub use render::{badge, hint, kv, print, receipt, simple_table, Column};
