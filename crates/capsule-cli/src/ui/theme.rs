//! Badges and text styling.

use owo_colors::{OwoColorize, Style};

/// Badge types for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Ok,
    Locked,
    Warn,
    Err,
}

impl Badge {
    /// Badge text for ASCII terminals, e.g. "[OK]".
    pub fn text(&self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Locked => "[LOCKED]",
            Self::Warn => "[WARN]",
            Self::Err => "[ERR]",
        }
    }

    pub fn display(&self, unicode: bool) -> &'static str {
        if !unicode {
            return self.text();
        }
        match self {
            Self::Ok => "[\u{2713}]",
            Self::Locked => "[\u{1F512}]",
            Self::Warn => "[\u{26A0}]",
            Self::Err => "[\u{2717}]",
        }
    }

    pub fn style(&self) -> Style {
        match self {
            Self::Ok => styles::success(),
            Self::Locked => styles::info(),
            Self::Warn => styles::warning(),
            Self::Err => styles::error(),
        }
    }
}

pub mod styles {
    use owo_colors::Style;

    pub fn dim() -> Style {
        Style::new().dimmed()
    }

    pub fn bold() -> Style {
        Style::new().bold()
    }

    pub fn success() -> Style {
        Style::new().green()
    }

    pub fn info() -> Style {
        Style::new().cyan()
    }

    pub fn warning() -> Style {
        Style::new().yellow()
    }

    pub fn error() -> Style {
        Style::new().red().bold()
    }
}

/// Apply `style` when color is enabled.
pub fn styled(text: &str, style: Style, color: bool) -> String {
    if color {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_display() {
        assert_eq!(Badge::Ok.display(false), "[OK]");
        assert_eq!(Badge::Locked.display(false), "[LOCKED]");
        assert_eq!(Badge::Ok.display(true), "[\u{2713}]");
    }

    #[test]
    fn test_styled_without_color_is_plain() {
        assert_eq!(styled("capsule", styles::bold(), false), "capsule");
        assert_ne!(styled("capsule", styles::bold(), true), "capsule");
    }
}
