//! Tracing subscriber setup.
//!
//! Logs always go to stderr so stdout stays parseable. `RUST_LOG` wins over
//! `--log-level`, which wins over the `[logging]` config section.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::config::LoggingSection;

const DEFAULT_LEVEL: &str = "warn";

/// Resolved logging options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl LogSettings {
    pub fn resolve(cli: &Cli, section: Option<&LoggingSection>) -> Self {
        let level = cli
            .log_level
            .map(|level| level.as_str().to_string())
            .or_else(|| section.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let json = cli.json_logs || section.is_some_and(|s| s.json);
        Self { level, json }
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(settings: &LogSettings) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    if settings.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
    }
}
