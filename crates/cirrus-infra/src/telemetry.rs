//! Tracing subscriber initialisation

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use anyhow::Context;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const DEFAULT_FILTER: &str = "cirrus=info";
const LOG_FORMAT_VAR: &str = "CIRRUS_LOG_FORMAT";

/// Output format of the console log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Read `CIRRUS_LOG_FORMAT`; unset means [`LogFormat::Text`].
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var(LOG_FORMAT_VAR) {
            Ok(value) => value.parse::<LogFormat>().context(LOG_FORMAT_VAR),
            Err(_) => Ok(LogFormat::default()),
        }
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Invalid log format: {} (expected text or json)", other),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `cirrus=info`) plus a console layer.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(Format::default().compact().with_target(false)),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("failed to install tracing subscriber")?;

    tracing::info!(format = %format, "Tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_format() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" TEXT ".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_telemetry(LogFormat::Text);
        assert!(init_telemetry(LogFormat::Json).is_err());
    }
}
