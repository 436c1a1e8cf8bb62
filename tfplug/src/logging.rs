//! Logging bootstrap for provider binaries
//!
//! Terraform reads the plugin handshake from stdout, so everything is written
//! to stderr. The level follows `TF_LOG_PROVIDER`, then `TF_LOG`.

use crate::error::{Result, TfplugError};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl FromStr for LogLevel {
    type Err = TfplugError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "JSON" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "OFF" => Ok(LogLevel::Off),
            other => Err(TfplugError::InvalidConfiguration(format!(
                "unknown log level '{}'",
                other
            ))),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Level from the Terraform environment, `Warn` when unset or unparsable
pub fn level_from_env() -> LogLevel {
    ["TF_LOG_PROVIDER", "TF_LOG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| value.parse().ok())
        .unwrap_or(LogLevel::Warn)
}

pub fn init(level: LogLevel) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| TfplugError::LoggingInit(e.to_string()))
}

pub fn init_from_env() -> Result<()> {
    init(level_from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_terraform_levels() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("JSON".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    #[serial]
    fn provider_specific_level_wins() {
        std::env::set_var("TF_LOG", "ERROR");
        std::env::set_var("TF_LOG_PROVIDER", "DEBUG");

        assert_eq!(level_from_env(), LogLevel::Debug);

        std::env::remove_var("TF_LOG_PROVIDER");
        assert_eq!(level_from_env(), LogLevel::Error);

        std::env::remove_var("TF_LOG");
        assert_eq!(level_from_env(), LogLevel::Warn);
    }
}
