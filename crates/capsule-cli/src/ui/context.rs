//! UI context for environment detection and output mode routing.

use std::io::IsTerminal;

/// How results are formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Machine-readable JSON only
    Json,
    /// Stable `key=value` text for scripts
    #[default]
    Plain,
    /// Tables and color for a terminal
    Pretty,
}

impl OutputMode {
    /// `--json` wins, then `--format plain` or `TERM=dumb`; pretty needs a TTY.
    pub fn resolve(
        json_flag: bool,
        format_flag: Option<&str>,
        is_tty: bool,
        term_is_dumb: bool,
    ) -> Self {
        if json_flag {
            Self::Json
        } else if format_flag == Some("plain") || term_is_dumb || !is_tty {
            Self::Plain
        } else {
            Self::Pretty
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_pretty(&self) -> bool {
        matches!(self, Self::Pretty)
    }
}

/// Terminal context for UI decisions.
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether color output is enabled
    pub color: bool,
    /// Whether unicode symbols are enabled
    pub unicode: bool,
    /// Resolved output mode
    pub mode: OutputMode,
}

impl UiContext {
    /// Create context from environment and CLI flags.
    ///
    /// Color is off under `NO_COLOR`, `TERM=dumb`, or without a TTY.
    pub fn from_env(json_flag: bool, format_flag: Option<&str>) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        let term_is_dumb = std::env::var("TERM").map(|v| v == "dumb").unwrap_or(false);
        let no_color_env = std::env::var("NO_COLOR").is_ok();

        Self {
            color: is_tty && !no_color_env && !term_is_dumb,
            unicode: !term_is_dumb,
            mode: OutputMode::resolve(json_flag, format_flag, is_tty, term_is_dumb),
        }
    }
}
