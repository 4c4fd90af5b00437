//! Process-wide log subscriber for the observer runner.
//!
//! Diagnostics always go to stderr; stdout carries only the run summary.
//! Without `RUST_LOG`, the observer crates log at the requested level and
//! every other crate is held to `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crates whose diagnostics follow the requested level.
const OBSERVER_TARGETS: &[&str] = &["observer_core", "observer_runner"];

/// Shape of a diagnostic log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// `warn` for everything, `level` for the observer crates.
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![Level::WARN.as_str().to_ascii_lowercase()];
    for target in OBSERVER_TARGETS {
        directives.push(format!("{target}={}", level.as_str().to_ascii_lowercase()));
    }
    directives.join(",")
}

/// Install the global subscriber. Returns `false` when one was already set,
/// in which case the existing subscriber stays in place.
pub fn init_tracing(format: LogFormat, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let lines = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let lines = match format {
        LogFormat::Text => lines.boxed(),
        LogFormat::Json => lines.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(lines)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_level_to_observer_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,observer_core=debug,observer_runner=debug"
        );
    }

    #[test]
    fn json_flag_selects_format() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Text);
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn second_install_is_refused() {
        init_tracing(LogFormat::Text, Level::WARN);
        assert!(!init_tracing(LogFormat::Json, Level::DEBUG));
    }
}
