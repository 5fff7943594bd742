//! Structured logging setup.
//!
//! `RUST_LOG` always wins; otherwise the level comes from settings.

use std::error::Error;

use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// `json` selects JSON lines; any other value means the human-readable format.
impl From<&str> for LogFormat {
    fn from(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(
    default_level: &str,
    format: LogFormat,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    }
}
