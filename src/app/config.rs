//! Application settings loaded once at startup.

use crate::domain::ConfigError;
use crate::infra::LogFormat;

/// Runtime settings read from the environment.
///
/// None of these change after startup; in particular `metrics_enabled` is
/// copied into the application state once and never re-read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub api_host: String,
    /// Port the HTTP server binds to
    pub api_port: u16,
    /// Default to debug-level logs when `RUST_LOG` is unset
    pub debug: bool,
    /// Whether `GET /metrics` serves the registry
    pub metrics_enabled: bool,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            debug: true,
            metrics_enabled: true,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults. A malformed port or boolean is an
    /// error; an unrecognised `LOG_FORMAT` falls back to the readable format.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_host = lookup("API_HOST").unwrap_or(defaults.api_host);
        let api_port = match lookup("API_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "API_PORT".to_string(),
                message: format!("'{raw}' is not a valid port"),
            })?,
            None => defaults.api_port,
        };
        let debug = match lookup("DEBUG") {
            Some(raw) => parse_bool("DEBUG", &raw)?,
            None => defaults.debug,
        };
        let metrics_enabled = match lookup("METRICS_ENABLED") {
            Some(raw) => parse_bool("METRICS_ENABLED", &raw)?,
            None => defaults.metrics_enabled,
        };
        let log_format = lookup("LOG_FORMAT")
            .map(|raw| LogFormat::from(raw.as_str()))
            .unwrap_or(defaults.log_format);

        Ok(Self {
            api_host,
            api_port,
            debug,
            metrics_enabled,
            log_format,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn default_log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
